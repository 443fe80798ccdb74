#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA, RSA-PSS, ECDSA, DSA, HMAC).
//!
//! Every asymmetric algorithm signs the prehash computed by
//! [`crate::digest`], so the hash named by the `SignatureMethod` is the one
//! actually used regardless of curve or key size. ECDSA and DSA signature
//! values use the XML-DSig `r || s` layout, not DER.

use rsa::{Pkcs1v15Sign, Pss};
use sigill_core::{Error, Result, TransformId};
use signature::hazmat::{PrehashSigner, PrehashVerifier};

/// Minimum truncated HMAC length accepted by default, in bits.
pub const HMAC_MIN_OUTPUT_BITS: usize = 80;

/// Key material for signature operations, borrowed from its owner.
#[derive(Clone, Copy)]
pub enum SigningKey<'a> {
    Rsa(&'a rsa::RsaPrivateKey),
    RsaPublic(&'a rsa::RsaPublicKey),
    EcP256(&'a p256::ecdsa::SigningKey),
    EcP256Public(&'a p256::ecdsa::VerifyingKey),
    EcP384(&'a p384::ecdsa::SigningKey),
    EcP384Public(&'a p384::ecdsa::VerifyingKey),
    Dsa(&'a dsa::SigningKey),
    DsaPublic(&'a dsa::VerifyingKey),
    Hmac(&'a [u8]),
}

impl SigningKey<'_> {
    /// Whether this key can produce signatures.
    pub fn can_sign(&self) -> bool {
        matches!(
            self,
            Self::Rsa(_) | Self::EcP256(_) | Self::EcP384(_) | Self::Dsa(_) | Self::Hmac(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rsa(_) | Self::RsaPublic(_) => "RSA",
            Self::EcP256(_) | Self::EcP256Public(_) => "EC P-256",
            Self::EcP384(_) | Self::EcP384Public(_) => "EC P-384",
            Self::Dsa(_) | Self::DsaPublic(_) => "DSA",
            Self::Hmac(_) => "HMAC",
        }
    }
}

impl std::fmt::Debug for SigningKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kind", &self.kind())
            .field("private", &self.can_sign())
            .finish()
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn id(&self) -> TransformId;
    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, key: &SigningKey<'_>, data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// Create a signature algorithm from its identifier.
///
/// `hmac_output_bits` truncates HMAC output (`HMACOutputLength`); it is
/// ignored for asymmetric algorithms.
pub fn from_id(
    id: TransformId,
    hmac_output_bits: Option<usize>,
) -> Result<Box<dyn SignatureAlgorithm>> {
    let Some(hash) = id.signature_digest() else {
        return Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {}",
            id.uri()
        )));
    };
    use TransformId::*;
    Ok(match id {
        RsaSha1 | RsaSha224 | RsaSha256 | RsaSha384 | RsaSha512 => {
            Box::new(RsaPkcs1v15 { id, hash })
        }
        RsaPssSha256 | RsaPssSha384 | RsaPssSha512 => Box::new(RsaPss { id, hash }),
        EcdsaSha1 | EcdsaSha224 | EcdsaSha256 | EcdsaSha384 | EcdsaSha512 => {
            Box::new(Ecdsa { id, hash })
        }
        DsaSha1 | DsaSha256 => Box::new(Dsa { id, hash }),
        HmacSha1 | HmacSha224 | HmacSha256 | HmacSha384 | HmacSha512 => Box::new(HmacSign {
            id,
            hash,
            output_bits: hmac_output_bits,
        }),
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "signature algorithm: {}",
                other.uri()
            )))
        }
    })
}

/// One-shot signing.
pub fn sign(id: TransformId, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
    from_id(id, None)?.sign(key, data)
}

/// One-shot verification.
pub fn verify(id: TransformId, key: &SigningKey<'_>, data: &[u8], signature: &[u8]) -> Result<bool> {
    from_id(id, None)?.verify(key, data, signature)
}

/// Whether an `HMACOutputLength` of `bits` may be honoured for `id`.
///
/// The length must be a whole number of bytes, no longer than the MAC, at
/// least `min_bits`, and at least half the MAC length.
pub fn hmac_output_bits_allowed(id: TransformId, bits: usize, min_bits: usize) -> bool {
    let Some(full_bits) = id
        .signature_digest()
        .filter(|_| id.is_hmac())
        .and_then(digest_len)
        .map(|len| len * 8)
    else {
        return false;
    };
    bits % 8 == 0 && bits <= full_bits && bits >= min_bits && bits * 2 >= full_bits
}

fn digest_len(hash: TransformId) -> Option<usize> {
    Some(match hash {
        TransformId::Sha1 => 20,
        TransformId::Sha224 => 28,
        TransformId::Sha256 => 32,
        TransformId::Sha384 => 48,
        TransformId::Sha512 => 64,
        _ => return None,
    })
}

fn unsupported_hash(hash: TransformId) -> Error {
    Error::UnsupportedAlgorithm(format!("hash {hash} for signatures"))
}

/// Dispatch on a SHA-1/SHA-2 identifier with the matching hasher type.
macro_rules! with_hasher {
    ($hash:expr, $h:ident => $body:expr) => {
        match $hash {
            TransformId::Sha1 => {
                type $h = sha1::Sha1;
                Ok($body)
            }
            TransformId::Sha224 => {
                type $h = sha2::Sha224;
                Ok($body)
            }
            TransformId::Sha256 => {
                type $h = sha2::Sha256;
                Ok($body)
            }
            TransformId::Sha384 => {
                type $h = sha2::Sha384;
                Ok($body)
            }
            TransformId::Sha512 => {
                type $h = sha2::Sha512;
                Ok($body)
            }
            other => Err(unsupported_hash(other)),
        }
    };
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    id: TransformId,
    hash: TransformId,
}

impl RsaPkcs1v15 {
    fn scheme(&self) -> Result<Pkcs1v15Sign> {
        with_hasher!(self.hash, H => Pkcs1v15Sign::new::<H>())
    }
}

fn rsa_public(key: &SigningKey<'_>, what: &str) -> Result<rsa::RsaPublicKey> {
    match key {
        SigningKey::Rsa(pk) => Ok(pk.to_public_key()),
        SigningKey::RsaPublic(pk) => Ok((*pk).clone()),
        other => Err(Error::Key(format!("{what} requires an RSA key, got {}", other.kind()))),
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn id(&self) -> TransformId {
        self.id
    }

    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        let hashed = crate::digest::digest(self.hash, data)?;
        private_key
            .sign(self.scheme()?, &hashed)
            .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))
    }

    fn verify(&self, key: &SigningKey<'_>, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let public_key = rsa_public(key, "RSA PKCS#1 v1.5")?;
        let hashed = crate::digest::digest(self.hash, data)?;
        Ok(public_key.verify(self.scheme()?, &hashed, sig_bytes).is_ok())
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

/// Salt length equals the digest length, MGF1 uses the same digest.
struct RsaPss {
    id: TransformId,
    hash: TransformId,
}

impl RsaPss {
    fn scheme(&self) -> Result<Pss> {
        with_hasher!(self.hash, H => Pss::new::<H>())
    }
}

impl SignatureAlgorithm for RsaPss {
    fn id(&self) -> TransformId {
        self.id
    }

    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required for PSS".into()));
        };
        let hashed = crate::digest::digest(self.hash, data)?;
        let mut rng = rand::thread_rng();
        private_key
            .sign_with_rng(&mut rng, self.scheme()?, &hashed)
            .map_err(|e| Error::Crypto(format!("RSA-PSS signing failed: {e}")))
    }

    fn verify(&self, key: &SigningKey<'_>, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let public_key = rsa_public(key, "RSA-PSS")?;
        let hashed = crate::digest::digest(self.hash, data)?;
        Ok(public_key.verify(self.scheme()?, &hashed, sig_bytes).is_ok())
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────

struct Ecdsa {
    id: TransformId,
    hash: TransformId,
}

impl SignatureAlgorithm for Ecdsa {
    fn id(&self) -> TransformId {
        self.id
    }

    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
        let hashed = crate::digest::digest(self.hash, data)?;
        let fail = |e: signature::Error| Error::Crypto(format!("ECDSA signing failed: {e}"));
        match key {
            SigningKey::EcP256(sk) => {
                let sig: p256::ecdsa::Signature = sk.sign_prehash(&hashed).map_err(fail)?;
                Ok(sig.to_bytes().to_vec())
            }
            SigningKey::EcP384(sk) => {
                let sig: p384::ecdsa::Signature = sk.sign_prehash(&hashed).map_err(fail)?;
                Ok(sig.to_bytes().to_vec())
            }
            other => Err(Error::Key(format!(
                "EC private key required, got {}",
                other.kind()
            ))),
        }
    }

    fn verify(&self, key: &SigningKey<'_>, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let hashed = crate::digest::digest(self.hash, data)?;
        match key {
            SigningKey::EcP256(sk) => verify_p256(sk.verifying_key(), &hashed, sig_bytes),
            SigningKey::EcP256Public(vk) => verify_p256(vk, &hashed, sig_bytes),
            SigningKey::EcP384(sk) => verify_p384(sk.verifying_key(), &hashed, sig_bytes),
            SigningKey::EcP384Public(vk) => verify_p384(vk, &hashed, sig_bytes),
            other => Err(Error::Key(format!("EC key required, got {}", other.kind()))),
        }
    }
}

fn malformed_ecdsa(e: signature::Error) -> Error {
    Error::Crypto(format!("malformed ECDSA signature value: {e}"))
}

fn verify_p256(vk: &p256::ecdsa::VerifyingKey, prehash: &[u8], sig_bytes: &[u8]) -> Result<bool> {
    let sig = p256::ecdsa::Signature::from_slice(sig_bytes).map_err(malformed_ecdsa)?;
    Ok(vk.verify_prehash(prehash, &sig).is_ok())
}

fn verify_p384(vk: &p384::ecdsa::VerifyingKey, prehash: &[u8], sig_bytes: &[u8]) -> Result<bool> {
    let sig = p384::ecdsa::Signature::from_slice(sig_bytes).map_err(malformed_ecdsa)?;
    Ok(vk.verify_prehash(prehash, &sig).is_ok())
}

// ── DSA ──────────────────────────────────────────────────────────────

struct Dsa {
    id: TransformId,
    hash: TransformId,
}

/// Byte length of each of `r` and `s`.
fn dsa_component_len(vk: &dsa::VerifyingKey) -> usize {
    (vk.components().q().bits() + 7) / 8
}

fn left_pad(out: &mut Vec<u8>, value: &[u8], len: usize) -> Result<()> {
    if value.len() > len {
        return Err(Error::Crypto("DSA signature component too long".into()));
    }
    out.resize(out.len() + (len - value.len()), 0);
    out.extend_from_slice(value);
    Ok(())
}

impl SignatureAlgorithm for Dsa {
    fn id(&self) -> TransformId {
        self.id
    }

    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Dsa(sk) = key else {
            return Err(Error::Key("DSA private key required".into()));
        };
        let hashed = crate::digest::digest(self.hash, data)?;
        let sig = with_hasher!(self.hash, H => sk.sign_prehashed_rfc6979::<H>(&hashed))?
            .map_err(|e| Error::Crypto(format!("DSA signing failed: {e}")))?;
        let len = dsa_component_len(sk.verifying_key());
        let mut out = Vec::with_capacity(len * 2);
        left_pad(&mut out, &sig.r().to_bytes_be(), len)?;
        left_pad(&mut out, &sig.s().to_bytes_be(), len)?;
        Ok(out)
    }

    fn verify(&self, key: &SigningKey<'_>, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let vk = match key {
            SigningKey::Dsa(sk) => sk.verifying_key(),
            SigningKey::DsaPublic(vk) => *vk,
            other => return Err(Error::Key(format!("DSA key required, got {}", other.kind()))),
        };
        let len = dsa_component_len(vk);
        if sig_bytes.len() != len * 2 {
            return Err(Error::Crypto(format!(
                "DSA signature must be {} bytes, got {}",
                len * 2,
                sig_bytes.len()
            )));
        }
        let (r, s) = sig_bytes.split_at(len);
        let Ok(sig) = dsa::Signature::from_components(
            dsa::BigUint::from_bytes_be(r),
            dsa::BigUint::from_bytes_be(s),
        ) else {
            return Ok(false);
        };
        let hashed = crate::digest::digest(self.hash, data)?;
        Ok(vk.verify_prehash(&hashed, &sig).is_ok())
    }
}

// ── HMAC ─────────────────────────────────────────────────────────────

struct HmacSign {
    id: TransformId,
    hash: TransformId,
    output_bits: Option<usize>,
}

impl HmacSign {
    fn output_len(&self) -> Result<Option<usize>> {
        let Some(bits) = self.output_bits else {
            return Ok(None);
        };
        // A zero floor here: the caller applies its configured minimum.
        if !hmac_output_bits_allowed(self.id, bits, 0) {
            return Err(Error::Crypto(format!(
                "HMAC output length {bits} is not valid for {}",
                self.id
            )));
        }
        Ok(Some(bits / 8))
    }
}

impl SignatureAlgorithm for HmacSign {
    fn id(&self) -> TransformId {
        self.id
    }

    fn sign(&self, key: &SigningKey<'_>, data: &[u8]) -> Result<Vec<u8>> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let mut mac = compute_hmac(self.hash, key_bytes, data)?;
        if let Some(len) = self.output_len()? {
            mac.truncate(len);
        }
        Ok(mac)
    }

    fn verify(&self, key: &SigningKey<'_>, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use hmac::{Hmac, Mac};
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let truncated = self.output_len()?;
        if let Some(len) = truncated {
            if sig_bytes.len() != len {
                return Ok(false);
            }
        }
        with_hasher!(self.hash, H => {
            let mut mac = <Hmac<H> as Mac>::new_from_slice(key_bytes)
                .map_err(|e| Error::Key(format!("HMAC key: {e}")))?;
            mac.update(data);
            match truncated {
                Some(_) => mac.verify_truncated_left(sig_bytes).is_ok(),
                None => mac.verify_slice(sig_bytes).is_ok(),
            }
        })
    }
}

fn compute_hmac(hash: TransformId, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{Hmac, Mac};
    with_hasher!(hash, H => {
        let mut mac = <Hmac<H> as Mac>::new_from_slice(key)
            .map_err(|e| Error::Key(format!("HMAC key: {e}")))?;
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::DecodePrivateKey;
    use rsa::pkcs1::DecodeRsaPrivateKey;

    const MSG: &[u8] = b"<SignedInfo>payload</SignedInfo>";

    fn rsa_key() -> rsa::RsaPrivateKey {
        rsa::RsaPrivateKey::from_pkcs1_pem(include_str!("../../../test-data/keys/rsa-2048.pem"))
            .unwrap()
    }

    fn check_round_trip(id: TransformId, key: SigningKey<'_>) -> Vec<u8> {
        let sig = sign(id, &key, MSG).unwrap();
        assert!(verify(id, &key, MSG, &sig).unwrap(), "{id}");
        assert!(!verify(id, &key, b"other", &sig).unwrap(), "{id}");
        sig
    }

    #[test]
    fn rsa_pkcs1v15_is_deterministic() {
        let key = rsa_key();
        let a = check_round_trip(TransformId::RsaSha256, SigningKey::Rsa(&key));
        let b = sign(TransformId::RsaSha256, &SigningKey::Rsa(&key), MSG).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);

        let public = key.to_public_key();
        assert!(verify(TransformId::RsaSha256, &SigningKey::RsaPublic(&public), MSG, &a).unwrap());
        // Signed with SHA-256, checked as SHA-1.
        assert!(!verify(TransformId::RsaSha1, &SigningKey::RsaPublic(&public), MSG, &a).unwrap());
    }

    #[test]
    fn rsa_pss() {
        let key = rsa_key();
        let a = check_round_trip(TransformId::RsaPssSha256, SigningKey::Rsa(&key));
        let b = sign(TransformId::RsaPssSha256, &SigningKey::Rsa(&key), MSG).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ecdsa_uses_raw_r_s() {
        let p256 = p256::ecdsa::SigningKey::from_pkcs8_pem(include_str!(
            "../../../test-data/keys/ec-p256.pem"
        ))
        .unwrap();
        assert_eq!(check_round_trip(TransformId::EcdsaSha256, SigningKey::EcP256(&p256)).len(), 64);
        // Hash longer than the curve order is truncated.
        check_round_trip(TransformId::EcdsaSha512, SigningKey::EcP256(&p256));
        let vk = *p256.verifying_key();
        let sig = sign(TransformId::EcdsaSha256, &SigningKey::EcP256(&p256), MSG).unwrap();
        assert!(verify(TransformId::EcdsaSha256, &SigningKey::EcP256Public(&vk), MSG, &sig).unwrap());

        let p384 = p384::ecdsa::SigningKey::from_pkcs8_pem(include_str!(
            "../../../test-data/keys/ec-p384.pem"
        ))
        .unwrap();
        assert_eq!(check_round_trip(TransformId::EcdsaSha384, SigningKey::EcP384(&p384)).len(), 96);
    }

    #[test]
    fn dsa_pads_components_to_q() {
        let sk = dsa::SigningKey::from_pkcs8_pem(include_str!("../../../test-data/keys/dsa-2048.pem"))
            .unwrap();
        let sig = check_round_trip(TransformId::DsaSha256, SigningKey::Dsa(&sk));
        assert_eq!(sig.len(), 64);
        let vk = sk.verifying_key().clone();
        assert!(verify(TransformId::DsaSha256, &SigningKey::DsaPublic(&vk), MSG, &sig).unwrap());
    }

    #[test]
    fn hmac_rfc4231_case_2() {
        let key = SigningKey::Hmac(b"Jefe");
        let mac = sign(TransformId::HmacSha256, &key, b"what do ya want for nothing?").unwrap();
        assert_eq!(
            crate::digest::to_hex(&mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_truncation_rules() {
        let key = SigningKey::Hmac(b"0123456789abcdef");
        let full = sign(TransformId::HmacSha256, &key, MSG).unwrap();

        // Without HMACOutputLength only the full MAC is accepted.
        assert!(!verify(TransformId::HmacSha256, &key, MSG, &full[..16]).unwrap());
        assert!(!verify(TransformId::HmacSha256, &key, MSG, &[]).unwrap());

        let truncated = from_id(TransformId::HmacSha256, Some(128)).unwrap();
        let short = truncated.sign(&key, MSG).unwrap();
        assert_eq!(short, full[..16]);
        assert!(truncated.verify(&key, MSG, &short).unwrap());
        assert!(!truncated.verify(&key, MSG, &full).unwrap());

        assert!(from_id(TransformId::HmacSha256, Some(64)).unwrap().sign(&key, MSG).is_err());
        assert!(hmac_output_bits_allowed(TransformId::HmacSha1, 80, HMAC_MIN_OUTPUT_BITS));
        assert!(!hmac_output_bits_allowed(TransformId::HmacSha1, 72, HMAC_MIN_OUTPUT_BITS));
        assert!(!hmac_output_bits_allowed(TransformId::HmacSha512, 128, HMAC_MIN_OUTPUT_BITS));
        assert!(!hmac_output_bits_allowed(TransformId::RsaSha256, 256, 0));
    }

    #[test]
    fn wrong_key_type_is_an_error() {
        let key = SigningKey::Hmac(b"k");
        assert!(matches!(sign(TransformId::RsaSha256, &key, MSG), Err(Error::Key(_))));
        let rsa = rsa_key();
        let public = rsa.to_public_key();
        assert!(!SigningKey::RsaPublic(&public).can_sign());
        assert!(matches!(
            sign(TransformId::RsaSha256, &SigningKey::RsaPublic(&public), MSG),
            Err(Error::Key(_))
        ));
        assert!(matches!(
            sign(TransformId::Sha256, &SigningKey::Rsa(&rsa), MSG),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
