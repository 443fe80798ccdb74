#![forbid(unsafe_code)]

//! BER parsing of PKCS#12 (PFX) structures (RFC 7292).
//!
//! PFX files in the wild are BER, not strict DER, so everything goes
//! through `yasna::parse_ber`.

use sigill_core::{Error, Result};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, BERReaderSeq, Tag};

use crate::kdf::{self, HashAlg, KdfPurpose, Pbes2Cipher};
use crate::Pkcs12Bundle;

mod oids {
    pub const DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
    pub const ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

    pub const KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
    pub const SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
    pub const CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
    pub const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

    pub const PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
    pub const PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
    pub const PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

    pub const AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
    pub const AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
    pub const AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

    pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
    pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
    pub const SHA384: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 2];
    pub const SHA512: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 3];

    pub const HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
    pub const HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];
    pub const HMAC_SHA384: &[u64] = &[1, 2, 840, 113549, 2, 10];
    pub const HMAC_SHA512: &[u64] = &[1, 2, 840, 113549, 2, 11];
}

fn is(oid: &ObjectIdentifier, components: &[u64]) -> bool {
    oid.components().as_slice() == components
}

fn invalid<T>() -> std::result::Result<T, ASN1Error> {
    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
}

fn malformed(what: &str) -> impl FnOnce(ASN1Error) -> Error + '_ {
    move |e| Error::Key(format!("malformed PKCS#12 {what}: {e}"))
}

/// How a blob inside the PFX is encrypted.
#[derive(Debug)]
enum Encryption {
    PbeSha1TripleDes {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: HashAlg,
        cipher: Pbes2Cipher,
        iv: Vec<u8>,
    },
}

impl Encryption {
    fn decrypt(&self, ciphertext: &[u8], password: &str) -> Result<Vec<u8>> {
        match self {
            Encryption::PbeSha1TripleDes { salt, iterations } => kdf::decrypt_pbe_sha1_3des(
                ciphertext,
                &kdf::bmp_password(password),
                salt,
                *iterations,
            ),
            Encryption::Pbes2 {
                salt,
                iterations,
                prf,
                cipher,
                iv,
            } => kdf::decrypt_pbes2(ciphertext, password, salt, *iterations, *prf, *cipher, iv),
        }
    }
}

struct MacData {
    hash: HashAlg,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum AuthenticatedSafe {
    Plain(Vec<u8>),
    Encrypted {
        encryption: Encryption,
        ciphertext: Vec<u8>,
    },
}

enum SafeBag {
    Key(Vec<u8>),
    ShroudedKey {
        encryption: Encryption,
        ciphertext: Vec<u8>,
    },
    Cert(Vec<u8>),
    Other,
}

pub(crate) fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Bundle> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return invalid();
            }
            let auth_safe = r.next().read_sequence(read_data_content)?;
            let mac = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(malformed("PFX"))?;

    match &mac {
        Some(mac) => {
            let mac_key = kdf::pkcs12_kdf(
                mac.hash,
                KdfPurpose::Mac,
                &kdf::bmp_password(password),
                &mac.salt,
                mac.iterations,
                mac.hash.output_len(),
            );
            kdf::verify_mac(mac.hash, &mac_key, &auth_safe, &mac.digest)?;
        }
        None => tracing::warn!("PKCS#12 file has no integrity MAC"),
    }

    let safes = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_authenticated_safe))
        .map_err(malformed("authenticated safe"))?;

    let mut bundle = Pkcs12Bundle::default();
    for safe in safes {
        let contents = match safe {
            AuthenticatedSafe::Plain(contents) => contents,
            AuthenticatedSafe::Encrypted {
                encryption,
                ciphertext,
            } => encryption.decrypt(&ciphertext, password)?,
        };
        let bags = yasna::parse_ber(&contents, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(malformed("safe contents"))?;
        for bag in bags {
            match bag {
                SafeBag::Key(pkcs8) => bundle.private_keys.push(pkcs8),
                SafeBag::ShroudedKey {
                    encryption,
                    ciphertext,
                } => bundle
                    .private_keys
                    .push(encryption.decrypt(&ciphertext, password)?),
                SafeBag::Cert(der) => bundle.certificates.push(der),
                SafeBag::Other => tracing::debug!("skipping unsupported PKCS#12 bag"),
            }
        }
    }
    tracing::debug!(
        keys = bundle.private_keys.len(),
        certificates = bundle.certificates.len(),
        "PKCS#12 bundle decoded"
    );
    Ok(bundle)
}

/// ContentInfo body of type `data`: `[0] EXPLICIT OCTET STRING`.
fn read_data_content(r: &mut BERReaderSeq) -> std::result::Result<Vec<u8>, ASN1Error> {
    let content_type = r.next().read_oid()?;
    if !is(&content_type, oids::DATA) {
        return invalid();
    }
    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
}

fn read_authenticated_safe(r: BERReader) -> std::result::Result<AuthenticatedSafe, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if is(&content_type, oids::DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(AuthenticatedSafe::Plain(data));
        }
        if !is(&content_type, oids::ENCRYPTED_DATA) {
            return invalid();
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let encryption = read_encryption(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(AuthenticatedSafe::Encrypted {
                        encryption,
                        ciphertext,
                    })
                })
            })
        })
    })
}

fn skip_bag_attributes(r: &mut BERReaderSeq) -> std::result::Result<(), ASN1Error> {
    r.read_optional(|r| r.read_der())?;
    Ok(())
}

fn read_safe_bag(r: BERReader) -> std::result::Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let bag = if is(&bag_type, oids::SHROUDED_KEY_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let encryption = read_encryption(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(SafeBag::ShroudedKey {
                        encryption,
                        ciphertext,
                    })
                })
            })?
        } else if is(&bag_type, oids::KEY_BAG) {
            SafeBag::Key(r.next().read_tagged(Tag::context(0), |r| r.read_der())?)
        } else if is(&bag_type, oids::CERT_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let cert_type = r.next().read_oid()?;
                    let value = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    Ok(if is(&cert_type, oids::X509_CERTIFICATE) {
                        SafeBag::Cert(value)
                    } else {
                        SafeBag::Other
                    })
                })
            })?
        } else {
            r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::Other
        };
        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

fn read_encryption(r: BERReader) -> std::result::Result<Encryption, ASN1Error> {
    r.read_sequence(|r| {
        let algorithm = r.next().read_oid()?;
        if is(&algorithm, oids::PBE_SHA1_3DES) {
            return r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Encryption::PbeSha1TripleDes { salt, iterations })
            });
        }
        if !is(&algorithm, oids::PBES2) {
            return invalid();
        }
        r.next().read_sequence(|r| {
            let (salt, iterations, prf) = r.next().read_sequence(|r| {
                if !is(&r.next().read_oid()?, oids::PBKDF2) {
                    return invalid();
                }
                r.next().read_sequence(|r| {
                    let salt = r.next().read_bytes()?;
                    let iterations = r.next().read_u32()?;
                    let _key_length = r.read_optional(|r| r.read_u32())?;
                    let prf = r.read_optional(read_prf)?.unwrap_or(HashAlg::Sha1);
                    Ok((salt, iterations, prf))
                })
            })?;
            let (cipher, iv) = r.next().read_sequence(|r| {
                let oid = r.next().read_oid()?;
                let cipher = if is(&oid, oids::AES_128_CBC) {
                    Pbes2Cipher::Aes128Cbc
                } else if is(&oid, oids::AES_192_CBC) {
                    Pbes2Cipher::Aes192Cbc
                } else if is(&oid, oids::AES_256_CBC) {
                    Pbes2Cipher::Aes256Cbc
                } else {
                    return invalid();
                };
                Ok((cipher, r.next().read_bytes()?))
            })?;
            Ok(Encryption::Pbes2 {
                salt,
                iterations,
                prf,
                cipher,
                iv,
            })
        })
    })
}

fn read_prf(r: BERReader) -> std::result::Result<HashAlg, ASN1Error> {
    r.read_sequence(|r| {
        let oid = r.next().read_oid()?;
        r.read_optional(|r| r.read_null())?;
        if is(&oid, oids::HMAC_SHA1) {
            Ok(HashAlg::Sha1)
        } else if is(&oid, oids::HMAC_SHA256) {
            Ok(HashAlg::Sha256)
        } else if is(&oid, oids::HMAC_SHA384) {
            Ok(HashAlg::Sha384)
        } else if is(&oid, oids::HMAC_SHA512) {
            Ok(HashAlg::Sha512)
        } else {
            invalid()
        }
    })
}

fn read_mac_data(r: BERReader) -> std::result::Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let oid = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if is(&oid, oids::SHA1) {
                    Ok(HashAlg::Sha1)
                } else if is(&oid, oids::SHA256) {
                    Ok(HashAlg::Sha256)
                } else if is(&oid, oids::SHA384) {
                    Ok(HashAlg::Sha384)
                } else if is(&oid, oids::SHA512) {
                    Ok(HashAlg::Sha512)
                } else {
                    invalid()
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}
