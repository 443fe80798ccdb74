#![forbid(unsafe_code)]

//! Key types and data structures.

use sigill_crypto::SigningKey;

/// The underlying key data.
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
    Dsa {
        private: Option<dsa::SigningKey>,
        public: dsa::VerifyingKey,
    },
    Hmac(Vec<u8>),
}

impl KeyData {
    pub fn rsa_private(key: rsa::RsaPrivateKey) -> Self {
        let public = key.to_public_key();
        Self::Rsa {
            private: Some(key),
            public,
        }
    }

    pub fn ec_p256_private(key: p256::ecdsa::SigningKey) -> Self {
        let public = *key.verifying_key();
        Self::EcP256 {
            private: Some(key),
            public,
        }
    }

    pub fn ec_p384_private(key: p384::ecdsa::SigningKey) -> Self {
        let public = *key.verifying_key();
        Self::EcP384 {
            private: Some(key),
            public,
        }
    }

    pub fn dsa_private(key: dsa::SigningKey) -> Self {
        let public = key.verifying_key().clone();
        Self::Dsa {
            private: Some(key),
            public,
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::Rsa { private, .. } => private.is_some(),
            Self::EcP256 { private, .. } => private.is_some(),
            Self::EcP384 { private, .. } => private.is_some(),
            Self::Dsa { private, .. } => private.is_some(),
            Self::Hmac(_) => true,
        }
    }

    fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::EcP256 { .. } => "EC P-256",
            Self::EcP384 { .. } => "EC P-384",
            Self::Dsa { .. } => "DSA",
            Self::Hmac(_) => "HMAC",
        }
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac(k) => write!(f, "HMAC key ({} bytes)", k.len()),
            other if other.has_private() => {
                write!(f, "{} private+public key", other.algorithm_name())
            }
            other => write!(f, "{} public key", other.algorithm_name()),
        }
    }
}

/// A named key with its certificate chain.
#[derive(Debug)]
pub struct Key {
    name: Option<String>,
    /// The key data.
    pub data: KeyData,
    /// X.509 certificate chain (DER), leaf first. Empty unless the key was
    /// loaded from a certificate or a PKCS#12 bundle.
    pub x509_chain: Vec<Vec<u8>>,
}

impl Key {
    pub fn new(data: KeyData) -> Self {
        Self {
            name: None,
            data,
            x509_chain: Vec::new(),
        }
    }

    /// Set the key name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_x509_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.x509_chain = chain;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the key can be used for signing. HMAC secrets always can.
    pub fn has_private_key(&self) -> bool {
        self.data.has_private()
    }

    /// Short algorithm family name, e.g. `"RSA"` or `"EC P-256"`.
    pub fn algorithm_name(&self) -> &'static str {
        self.data.algorithm_name()
    }

    /// Borrow the key material for the crypto layer. Private material is
    /// preferred when present.
    pub fn signing_key(&self) -> SigningKey<'_> {
        match &self.data {
            KeyData::Rsa {
                private: Some(k), ..
            } => SigningKey::Rsa(k),
            KeyData::Rsa { public, .. } => SigningKey::RsaPublic(public),
            KeyData::EcP256 {
                private: Some(k), ..
            } => SigningKey::EcP256(k),
            KeyData::EcP256 { public, .. } => SigningKey::EcP256Public(public),
            KeyData::EcP384 {
                private: Some(k), ..
            } => SigningKey::EcP384(k),
            KeyData::EcP384 { public, .. } => SigningKey::EcP384Public(public),
            KeyData::Dsa {
                private: Some(k), ..
            } => SigningKey::Dsa(k),
            KeyData::Dsa { public, .. } => SigningKey::DsaPublic(public),
            KeyData::Hmac(secret) => SigningKey::Hmac(secret),
        }
    }
}
