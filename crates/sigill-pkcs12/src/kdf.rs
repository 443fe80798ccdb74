#![forbid(unsafe_code)]

//! Password-based key derivation and decryption for PKCS#12.
//!
//! Two derivation schemes appear in practice:
//! 1. the PKCS#12 KDF (RFC 7292 Appendix B), used for the integrity MAC key
//!    and by the legacy `pbeWithSHAAnd3-KeyTripleDES-CBC` scheme, and
//! 2. PBES2 (PBKDF2 + AES-CBC), the OpenSSL 3.x default.

use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use digest::core_api::BlockSizeUser;
use digest::{Digest, FixedOutputReset};
use hmac::{Hmac, Mac};
use sigill_core::{Error, Result};

/// What the PKCS#12 KDF output is for (the "ID" byte of RFC 7292 B.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KdfPurpose {
    Key = 1,
    Iv = 2,
    Mac = 3,
}

/// Hash functions usable for the PKCS#12 KDF, the MAC and the PBKDF2 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    pub fn output_len(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }
}

/// PBES2 encryption schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pbes2Cipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl Pbes2Cipher {
    fn key_len(self) -> usize {
        match self {
            Pbes2Cipher::Aes128Cbc => 16,
            Pbes2Cipher::Aes192Cbc => 24,
            Pbes2Cipher::Aes256Cbc => 32,
        }
    }
}

/// PKCS#12 KDF (RFC 7292 Appendix B.2).
///
/// `password` must already be BMP-encoded (see [`bmp_password`]).
pub fn pkcs12_kdf(
    hash: HashAlg,
    purpose: KdfPurpose,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    match hash {
        HashAlg::Sha1 => derive::<sha1::Sha1>(purpose, password, salt, iterations, output_len),
        HashAlg::Sha256 => derive::<sha2::Sha256>(purpose, password, salt, iterations, output_len),
        HashAlg::Sha384 => derive::<sha2::Sha384>(purpose, password, salt, iterations, output_len),
        HashAlg::Sha512 => derive::<sha2::Sha512>(purpose, password, salt, iterations, output_len),
    }
}

fn derive<D>(
    purpose: KdfPurpose,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8>
where
    D: Digest + FixedOutputReset + BlockSizeUser,
{
    let u = <D as Digest>::output_size();
    let v = D::block_size();

    let diversifier = vec![purpose as u8; v];
    let mut input = repeat_to_block_multiple(salt, v);
    input.extend(repeat_to_block_multiple(password, v));

    let rounds = output_len.div_ceil(u);
    let mut out = Vec::with_capacity(rounds * u);
    let mut hasher = D::new();
    for round in 0..rounds {
        Digest::update(&mut hasher, &diversifier);
        Digest::update(&mut hasher, &input);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        out.extend_from_slice(&a);

        if round + 1 < rounds {
            let b = repeat_to_block_multiple(&a, v);
            for chunk in input.chunks_mut(v) {
                add_with_carry(chunk, &b);
            }
        }
    }
    out.truncate(output_len);
    out
}

/// Repeat `data` up to the next multiple of `v` bytes; empty stays empty.
fn repeat_to_block_multiple(data: &[u8], v: usize) -> Vec<u8> {
    let len = data.len().div_ceil(v) * v;
    data.iter().copied().cycle().take(len).collect()
}

/// `block = (block + b + 1) mod 2^(8 * block.len())`
fn add_with_carry(block: &mut [u8], b: &[u8]) {
    let mut carry = 1u16;
    for (x, y) in block.iter_mut().rev().zip(b.iter().rev()) {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = sum as u8;
        carry = sum >> 8;
    }
}

/// BMPString encoding (UTF-16BE plus a two byte terminator). The empty
/// password encodes to nothing at all.
pub fn bmp_password(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    password
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_be_bytes)
        .collect()
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>
where
    C: BlockDecryptMut + cipher::BlockCipher + cipher::KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| Error::Key(format!("CBC init failed: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Key("decryption failed (wrong password?)".into()))
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC`
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>> {
    let key = pkcs12_kdf(HashAlg::Sha1, KdfPurpose::Key, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf(HashAlg::Sha1, KdfPurpose::Iv, bmp_password, salt, iterations, 8);
    cbc_decrypt::<des::TdesEde3>(&key, &iv, ciphertext)
}

/// PBES2 with PBKDF2 (RFC 8018).
pub fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    prf: HashAlg,
    scheme: Pbes2Cipher,
    iv: &[u8],
) -> Result<Vec<u8>> {
    let mut key = vec![0u8; scheme.key_len()];
    let password = password.as_bytes();
    match prf {
        HashAlg::Sha1 => pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, &mut key),
        HashAlg::Sha256 => pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, &mut key),
        HashAlg::Sha384 => pbkdf2::pbkdf2_hmac::<sha2::Sha384>(password, salt, iterations, &mut key),
        HashAlg::Sha512 => pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, iterations, &mut key),
    }
    match scheme {
        Pbes2Cipher::Aes128Cbc => cbc_decrypt::<aes::Aes128>(&key, iv, ciphertext),
        Pbes2Cipher::Aes192Cbc => cbc_decrypt::<aes::Aes192>(&key, iv, ciphertext),
        Pbes2Cipher::Aes256Cbc => cbc_decrypt::<aes::Aes256>(&key, iv, ciphertext),
    }
}

/// Check the PFX integrity MAC in constant time.
pub fn verify_mac(hash: HashAlg, key: &[u8], data: &[u8], expected: &[u8]) -> Result<()> {
    fn check<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        match <M as Mac>::new_from_slice(key) {
            Ok(mut mac) => {
                mac.update(data);
                mac.verify_slice(expected).is_ok()
            }
            Err(_) => false,
        }
    }
    let ok = match hash {
        HashAlg::Sha1 => check::<Hmac<sha1::Sha1>>(key, data, expected),
        HashAlg::Sha256 => check::<Hmac<sha2::Sha256>>(key, data, expected),
        HashAlg::Sha384 => check::<Hmac<sha2::Sha384>>(key, data, expected),
        HashAlg::Sha512 => check::<Hmac<sha2::Sha512>>(key, data, expected),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Key("PKCS#12 MAC verification failed (wrong password?)".into()))
    }
}
