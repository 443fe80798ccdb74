#![forbid(unsafe_code)]

//! Key loading from PEM, DER, PKCS#8, PKCS#12, X.509 and raw bytes.
//!
//! Every failure surfaces as [`Error::KeyLoad`]; the parser-level cause is
//! kept in the message.

use crate::key::{Key, KeyData};
use der::{Decode, Encode};
use pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use pkcs8::ObjectIdentifier;
use sigill_core::{Error, Result};
use std::path::Path;

const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Encoding of the key bytes handed to the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDataFormat {
    /// Not specified; always rejected.
    #[default]
    Unknown,
    /// Raw bytes, used as an HMAC secret.
    Binary,
    /// PEM private or public key, detected from the label.
    Pem,
    /// DER private or public key. Private encodings are tried first.
    Der,
    Pkcs8Pem,
    Pkcs8Der,
    /// PKCS#12 / PFX bundle.
    Pkcs12,
    /// X.509 certificate(s) in PEM; the first one supplies the public key.
    CertPem,
    CertDer,
}

impl KeyDataFormat {
    pub const ALL: &'static [KeyDataFormat] = &[
        Self::Binary,
        Self::Pem,
        Self::Der,
        Self::Pkcs8Pem,
        Self::Pkcs8Der,
        Self::Pkcs12,
        Self::CertPem,
        Self::CertDer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Binary => "binary",
            Self::Pem => "pem",
            Self::Der => "der",
            Self::Pkcs8Pem => "pkcs8-pem",
            Self::Pkcs8Der => "pkcs8-der",
            Self::Pkcs12 => "pkcs12",
            Self::CertPem => "cert-pem",
            Self::CertDer => "cert-der",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for KeyDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Load a key from memory.
pub fn load_from_memory(data: &[u8], format: KeyDataFormat) -> Result<Key> {
    load_from_memory_with_password(data, format, None)
}

/// Load a key from memory, decrypting with `password` where the format
/// supports encryption (PKCS#8 and PKCS#12).
pub fn load_from_memory_with_password(
    data: &[u8],
    format: KeyDataFormat,
    password: Option<&str>,
) -> Result<Key> {
    if data.is_empty() {
        return Err(Error::KeyLoad("key data is empty".into()));
    }
    let key = decode(data, format, password).map_err(into_key_load)?;
    tracing::debug!(%format, algorithm = key.algorithm_name(), private = key.has_private_key(), "loaded key");
    Ok(key)
}

/// Load a key from a file. The key is named after the path.
pub fn load_from_file(path: impl AsRef<Path>, format: KeyDataFormat) -> Result<Key> {
    load_from_file_with_password(path, format, None)
}

pub fn load_from_file_with_password(
    path: impl AsRef<Path>,
    format: KeyDataFormat,
    password: Option<&str>,
) -> Result<Key> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .map_err(|e| Error::KeyLoad(format!("{}: {e}", path.display())))?;
    let key = load_from_memory_with_password(&data, format, password)?;
    let name = path.to_str().ok_or_else(|| {
        Error::KeyLoad(format!("{}: path is not valid UTF-8", path.display()))
    })?;
    Ok(key.with_name(name))
}

fn into_key_load(err: Error) -> Error {
    match err {
        Error::KeyLoad(_) => err,
        other => Error::KeyLoad(other.to_string()),
    }
}

fn decode(data: &[u8], format: KeyDataFormat, password: Option<&str>) -> Result<Key> {
    match format {
        KeyDataFormat::Unknown => Err(Error::KeyLoad("key data format is unknown".into())),
        KeyDataFormat::Binary => Ok(Key::new(KeyData::Hmac(data.to_vec()))),
        KeyDataFormat::Pem => {
            let (label, der) = decode_pem(data)?;
            from_pem_block(label, &der, password)
        }
        KeyDataFormat::Der => from_der(data, password),
        KeyDataFormat::Pkcs8Pem => {
            let (label, der) = decode_pem(data)?;
            match label {
                "PRIVATE KEY" | "ENCRYPTED PRIVATE KEY" => from_pem_block(label, &der, password),
                other => Err(Error::Key(format!("expected a PKCS#8 PEM block, found {other}"))),
            }
        }
        KeyDataFormat::Pkcs8Der => match password {
            Some(password) => from_encrypted_pkcs8_der(data, password),
            None => from_pkcs8_der(data),
        },
        KeyDataFormat::Pkcs12 => from_pkcs12(data, password.unwrap_or("")),
        KeyDataFormat::CertPem => {
            let chain = x509_cert::Certificate::load_pem_chain(data)
                .map_err(|e| Error::Certificate(format!("invalid PEM certificate: {e}")))?;
            let ders = chain
                .iter()
                .map(|cert| {
                    cert.to_der()
                        .map_err(|e| Error::Certificate(format!("re-encoding certificate: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;
            from_certificate_chain(ders)
        }
        KeyDataFormat::CertDer => from_certificate_chain(vec![data.to_vec()]),
    }
}

fn decode_pem(data: &[u8]) -> Result<(&str, Vec<u8>)> {
    pem_rfc7468::decode_vec(data).map_err(|e| Error::Key(format!("invalid PEM: {e}")))
}

fn from_pem_block(label: &str, der: &[u8], password: Option<&str>) -> Result<Key> {
    match label {
        "RSA PRIVATE KEY" => from_pkcs1_private_der(der),
        "EC PRIVATE KEY" => from_sec1_der(der),
        "PRIVATE KEY" => from_pkcs8_der(der),
        "ENCRYPTED PRIVATE KEY" => {
            let password = password.ok_or_else(|| {
                Error::Key("encrypted private key requires a password".into())
            })?;
            from_encrypted_pkcs8_der(der, password)
        }
        "PUBLIC KEY" => from_spki_der(der),
        "RSA PUBLIC KEY" => from_pkcs1_public_der(der),
        "CERTIFICATE" => from_certificate_chain(vec![der.to_vec()]),
        other => Err(Error::Key(format!("unsupported PEM label: {other}"))),
    }
}

/// DER with no label: try each private encoding, then each public one.
fn from_der(der: &[u8], password: Option<&str>) -> Result<Key> {
    if let Some(password) = password {
        if let Ok(key) = from_encrypted_pkcs8_der(der, password) {
            return Ok(key);
        }
    }
    from_pkcs8_der(der)
        .or_else(|_| from_pkcs1_private_der(der))
        .or_else(|_| from_sec1_der(der))
        .or_else(|_| from_spki_der(der))
        .or_else(|_| from_pkcs1_public_der(der))
        .map_err(|_| Error::Key("DER data is not a recognised private or public key".into()))
}

fn from_pkcs1_private_der(der: &[u8]) -> Result<Key> {
    let key = rsa::RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| Error::Key(format!("invalid PKCS#1 RSA private key: {e}")))?;
    Ok(Key::new(KeyData::rsa_private(key)))
}

fn from_pkcs1_public_der(der: &[u8]) -> Result<Key> {
    let public = rsa::RsaPublicKey::from_pkcs1_der(der)
        .map_err(|e| Error::Key(format!("invalid PKCS#1 RSA public key: {e}")))?;
    Ok(Key::new(KeyData::Rsa {
        private: None,
        public,
    }))
}

fn from_sec1_der(der: &[u8]) -> Result<Key> {
    if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
        return Ok(Key::new(KeyData::ec_p256_private(secret.into())));
    }
    let secret = p384::SecretKey::from_sec1_der(der)
        .map_err(|e| Error::Key(format!("invalid SEC1 EC private key: {e}")))?;
    Ok(Key::new(KeyData::ec_p384_private(secret.into())))
}

/// Unencrypted PKCS#8, dispatched on the algorithm OID.
fn from_pkcs8_der(der: &[u8]) -> Result<Key> {
    let bad = |e: pkcs8::Error| Error::Key(format!("invalid PKCS#8 private key: {e}"));
    let info = pkcs8::PrivateKeyInfo::try_from(der).map_err(bad)?;
    let oid = info.algorithm.oid;
    let data = if oid == pkcs1::ALGORITHM_OID {
        KeyData::rsa_private(rsa::RsaPrivateKey::try_from(info).map_err(bad)?)
    } else if oid == EC_PUBLIC_KEY_OID {
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| Error::Key(format!("EC key without named curve: {e}")))?;
        if curve == SECP256R1_OID {
            KeyData::ec_p256_private(p256::ecdsa::SigningKey::try_from(info).map_err(bad)?)
        } else if curve == SECP384R1_OID {
            KeyData::ec_p384_private(p384::ecdsa::SigningKey::try_from(info).map_err(bad)?)
        } else {
            return Err(Error::UnsupportedAlgorithm(format!("EC curve {curve}")));
        }
    } else if oid == dsa::OID {
        KeyData::dsa_private(dsa::SigningKey::try_from(info).map_err(bad)?)
    } else {
        return Err(Error::UnsupportedAlgorithm(format!("private key algorithm {oid}")));
    };
    Ok(Key::new(data))
}

fn from_encrypted_pkcs8_der(der: &[u8], password: &str) -> Result<Key> {
    let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(der)
        .map_err(|e| Error::Key(format!("invalid encrypted PKCS#8 key: {e}")))?;
    let decrypted = encrypted
        .decrypt(password)
        .map_err(|e| Error::Key(format!("cannot decrypt PKCS#8 key (wrong password?): {e}")))?;
    from_pkcs8_der(decrypted.as_bytes())
}

/// SubjectPublicKeyInfo, dispatched on the algorithm OID.
fn from_spki_der(der: &[u8]) -> Result<Key> {
    let bad = |e: spki::Error| Error::Key(format!("invalid public key: {e}"));
    let info = spki::SubjectPublicKeyInfoRef::try_from(der).map_err(bad)?;
    let oid = info.algorithm.oid;
    let data = if oid == pkcs1::ALGORITHM_OID {
        KeyData::Rsa {
            private: None,
            public: rsa::RsaPublicKey::try_from(info).map_err(bad)?,
        }
    } else if oid == EC_PUBLIC_KEY_OID {
        let curve = info.algorithm.parameters_oid().map_err(bad)?;
        if curve == SECP256R1_OID {
            KeyData::EcP256 {
                private: None,
                public: p256::ecdsa::VerifyingKey::try_from(info).map_err(bad)?,
            }
        } else if curve == SECP384R1_OID {
            KeyData::EcP384 {
                private: None,
                public: p384::ecdsa::VerifyingKey::try_from(info).map_err(bad)?,
            }
        } else {
            return Err(Error::UnsupportedAlgorithm(format!("EC curve {curve}")));
        }
    } else if oid == dsa::OID {
        KeyData::Dsa {
            private: None,
            public: dsa::VerifyingKey::try_from(info).map_err(bad)?,
        }
    } else {
        return Err(Error::UnsupportedAlgorithm(format!("public key algorithm {oid}")));
    };
    Ok(Key::new(data))
}

/// Public key of the first certificate; the whole chain is kept.
fn from_certificate_chain(chain: Vec<Vec<u8>>) -> Result<Key> {
    let leaf = chain
        .first()
        .ok_or_else(|| Error::Certificate("no certificate found".into()))?;
    let cert = x509_cert::Certificate::from_der(leaf)
        .map_err(|e| Error::Certificate(format!("invalid certificate: {e}")))?;
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("re-encoding public key: {e}")))?;
    Ok(from_spki_der(&spki)?.with_x509_chain(chain))
}

fn from_pkcs12(data: &[u8], password: &str) -> Result<Key> {
    let bundle = sigill_pkcs12::parse_pkcs12(data, password)?;
    let first = bundle
        .private_keys
        .first()
        .ok_or_else(|| Error::Key("PKCS#12 bundle contains no private key".into()))?;
    Ok(from_pkcs8_der(first)?.with_x509_chain(bundle.certificates))
}
