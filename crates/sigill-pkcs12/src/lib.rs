#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) reader for sigill.
//!
//! Supports both legacy PBE (SHA-1 + 3DES-CBC) and PBES2 (PBKDF2 + AES-CBC)
//! as written by OpenSSL 1.x and 3.x respectively. Only what key loading
//! needs is extracted: private keys and X.509 certificates.

mod kdf;
mod parse;

use sigill_core::Result;

/// Contents extracted from a PKCS#12 file.
#[derive(Debug, Default)]
pub struct Pkcs12Bundle {
    /// PKCS#8 DER-encoded private keys.
    pub private_keys: Vec<Vec<u8>>,
    /// DER-encoded X.509 certificates, in file order.
    pub certificates: Vec<Vec<u8>>,
}

/// Parse a PKCS#12 file, checking its MAC and decrypting with `password`.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Bundle> {
    parse::parse_pfx(data, password)
}
