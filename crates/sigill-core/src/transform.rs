#![forbid(unsafe_code)]

//! The closed set of algorithm identifiers understood by sigill.
//!
//! A [`TransformId`] names a canonicalization method, a reference
//! transform, a digest or a signature algorithm. Its URI is what ends up in
//! `Algorithm` attributes, so the table below is part of the public
//! contract.

use crate::algorithm;
use std::fmt;

/// What a [`TransformId`] may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformUsage {
    /// `CanonicalizationMethod`, also valid inside `Transforms`.
    Canonicalization,
    /// Only valid inside a Reference's `Transforms`.
    ReferenceTransform,
    /// `DigestMethod`.
    Digest,
    /// `SignatureMethod`.
    Signature,
}

macro_rules! transform_ids {
    ($( $variant:ident => ($uri:expr, $name:literal, $usage:ident) ),+ $(,)?) => {
        /// An algorithm identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TransformId {
            $( $variant, )+
        }

        impl TransformId {
            /// Every registered identifier, in registry order.
            pub const ALL: &'static [TransformId] = &[ $( TransformId::$variant, )+ ];

            /// The algorithm URI.
            pub fn uri(self) -> &'static str {
                match self {
                    $( TransformId::$variant => $uri, )+
                }
            }

            /// Short name, as used by the command line tool.
            pub fn name(self) -> &'static str {
                match self {
                    $( TransformId::$variant => $name, )+
                }
            }

            pub fn usage(self) -> TransformUsage {
                match self {
                    $( TransformId::$variant => TransformUsage::$usage, )+
                }
            }
        }
    };
}

transform_ids! {
    C14n => (algorithm::C14N, "c14n", Canonicalization),
    C14nWithComments => (algorithm::C14N_WITH_COMMENTS, "c14n-with-comments", Canonicalization),
    C14n11 => (algorithm::C14N11, "c14n11", Canonicalization),
    C14n11WithComments => (algorithm::C14N11_WITH_COMMENTS, "c14n11-with-comments", Canonicalization),
    ExcC14n => (algorithm::EXC_C14N, "exc-c14n", Canonicalization),
    ExcC14nWithComments => (algorithm::EXC_C14N_WITH_COMMENTS, "exc-c14n-with-comments", Canonicalization),

    Enveloped => (algorithm::ENVELOPED_SIGNATURE, "enveloped-signature", ReferenceTransform),
    Base64 => (algorithm::BASE64, "base64", ReferenceTransform),
    XPath => (algorithm::XPATH, "xpath", ReferenceTransform),

    Sha1 => (algorithm::SHA1, "sha1", Digest),
    Sha224 => (algorithm::SHA224, "sha224", Digest),
    Sha256 => (algorithm::SHA256, "sha256", Digest),
    Sha384 => (algorithm::SHA384, "sha384", Digest),
    Sha512 => (algorithm::SHA512, "sha512", Digest),
    Sha3_224 => (algorithm::SHA3_224, "sha3-224", Digest),
    Sha3_256 => (algorithm::SHA3_256, "sha3-256", Digest),
    Sha3_384 => (algorithm::SHA3_384, "sha3-384", Digest),
    Sha3_512 => (algorithm::SHA3_512, "sha3-512", Digest),

    RsaSha1 => (algorithm::RSA_SHA1, "rsa-sha1", Signature),
    RsaSha224 => (algorithm::RSA_SHA224, "rsa-sha224", Signature),
    RsaSha256 => (algorithm::RSA_SHA256, "rsa-sha256", Signature),
    RsaSha384 => (algorithm::RSA_SHA384, "rsa-sha384", Signature),
    RsaSha512 => (algorithm::RSA_SHA512, "rsa-sha512", Signature),
    RsaPssSha256 => (algorithm::RSA_PSS_SHA256, "rsa-pss-sha256", Signature),
    RsaPssSha384 => (algorithm::RSA_PSS_SHA384, "rsa-pss-sha384", Signature),
    RsaPssSha512 => (algorithm::RSA_PSS_SHA512, "rsa-pss-sha512", Signature),
    DsaSha1 => (algorithm::DSA_SHA1, "dsa-sha1", Signature),
    DsaSha256 => (algorithm::DSA_SHA256, "dsa-sha256", Signature),
    EcdsaSha1 => (algorithm::ECDSA_SHA1, "ecdsa-sha1", Signature),
    EcdsaSha224 => (algorithm::ECDSA_SHA224, "ecdsa-sha224", Signature),
    EcdsaSha256 => (algorithm::ECDSA_SHA256, "ecdsa-sha256", Signature),
    EcdsaSha384 => (algorithm::ECDSA_SHA384, "ecdsa-sha384", Signature),
    EcdsaSha512 => (algorithm::ECDSA_SHA512, "ecdsa-sha512", Signature),
    HmacSha1 => (algorithm::HMAC_SHA1, "hmac-sha1", Signature),
    HmacSha224 => (algorithm::HMAC_SHA224, "hmac-sha224", Signature),
    HmacSha256 => (algorithm::HMAC_SHA256, "hmac-sha256", Signature),
    HmacSha384 => (algorithm::HMAC_SHA384, "hmac-sha384", Signature),
    HmacSha512 => (algorithm::HMAC_SHA512, "hmac-sha512", Signature),
}

impl TransformId {
    /// Look up an identifier by its algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.uri() == uri)
    }

    /// Look up an identifier by its short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }

    pub fn is_canonicalization(self) -> bool {
        self.usage() == TransformUsage::Canonicalization
    }

    pub fn is_digest(self) -> bool {
        self.usage() == TransformUsage::Digest
    }

    pub fn is_signature(self) -> bool {
        self.usage() == TransformUsage::Signature
    }

    /// Whether this identifier may appear as a `<Transform>` of a Reference.
    pub fn is_reference_transform(self) -> bool {
        matches!(
            self.usage(),
            TransformUsage::Canonicalization | TransformUsage::ReferenceTransform
        )
    }

    pub fn is_hmac(self) -> bool {
        matches!(
            self,
            TransformId::HmacSha1
                | TransformId::HmacSha224
                | TransformId::HmacSha256
                | TransformId::HmacSha384
                | TransformId::HmacSha512
        )
    }

    /// The digest a signature algorithm hashes with.
    pub fn signature_digest(self) -> Option<TransformId> {
        use TransformId::*;
        let digest = match self {
            RsaSha1 | DsaSha1 | EcdsaSha1 | HmacSha1 => Sha1,
            RsaSha224 | EcdsaSha224 | HmacSha224 => Sha224,
            RsaSha256 | RsaPssSha256 | DsaSha256 | EcdsaSha256 | HmacSha256 => Sha256,
            RsaSha384 | RsaPssSha384 | EcdsaSha384 | HmacSha384 => Sha384,
            RsaSha512 | RsaPssSha512 | EcdsaSha512 | HmacSha512 => Sha512,
            _ => return None,
        };
        Some(digest)
    }
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
