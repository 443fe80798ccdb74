#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations.

use digest::Digest;
use sigill_core::{Error, Result, TransformId};

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn id(&self) -> TransformId;
}

/// Create a digest algorithm from its identifier.
pub fn from_id(id: TransformId) -> Result<Box<dyn DigestAlgorithm>> {
    match id {
        TransformId::Sha1 => Ok(Box::new(Sha1Digest::new())),
        TransformId::Sha224 => Ok(Box::new(Sha224Digest::new())),
        TransformId::Sha256 => Ok(Box::new(Sha256Digest::new())),
        TransformId::Sha384 => Ok(Box::new(Sha384Digest::new())),
        TransformId::Sha512 => Ok(Box::new(Sha512Digest::new())),
        TransformId::Sha3_224 => Ok(Box::new(Sha3_224Digest::new())),
        TransformId::Sha3_256 => Ok(Box::new(Sha3_256Digest::new())),
        TransformId::Sha3_384 => Ok(Box::new(Sha3_384Digest::new())),
        TransformId::Sha3_512 => Ok(Box::new(Sha3_512Digest::new())),
        other => Err(Error::UnsupportedAlgorithm(format!(
            "digest algorithm: {}",
            other.uri()
        ))),
    }
}

/// Compute a digest in one shot.
pub fn digest(id: TransformId, data: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = from_id(id)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $id:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn id(&self) -> TransformId {
                $id
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, TransformId::Sha1);
impl_digest!(Sha224Digest, sha2::Sha224, TransformId::Sha224);
impl_digest!(Sha256Digest, sha2::Sha256, TransformId::Sha256);
impl_digest!(Sha384Digest, sha2::Sha384, TransformId::Sha384);
impl_digest!(Sha512Digest, sha2::Sha512, TransformId::Sha512);
impl_digest!(Sha3_224Digest, sha3::Sha3_224, TransformId::Sha3_224);
impl_digest!(Sha3_256Digest, sha3::Sha3_256, TransformId::Sha3_256);
impl_digest!(Sha3_384Digest, sha3::Sha3_384, TransformId::Sha3_384);
impl_digest!(Sha3_512Digest, sha3::Sha3_512, TransformId::Sha3_512);

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_answer() {
        let result = digest(TransformId::Sha256, b"hello").unwrap();
        assert_eq!(
            to_hex(&result),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn output_lengths() {
        let cases = [
            (TransformId::Sha1, 20),
            (TransformId::Sha224, 28),
            (TransformId::Sha384, 48),
            (TransformId::Sha512, 64),
            (TransformId::Sha3_256, 32),
            (TransformId::Sha3_512, 64),
        ];
        for (id, len) in cases {
            assert_eq!(digest(id, b"hello").unwrap().len(), len, "{id}");
        }
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = from_id(TransformId::Sha384).unwrap();
        hasher.update(b"hel");
        hasher.update(b"lo");
        assert_eq!(hasher.id(), TransformId::Sha384);
        assert_eq!(hasher.finalize(), digest(TransformId::Sha384, b"hello").unwrap());
    }

    #[test]
    fn non_digest_is_rejected() {
        assert!(matches!(
            digest(TransformId::RsaSha256, b"x"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
