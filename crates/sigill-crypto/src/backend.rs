#![forbid(unsafe_code)]

//! Crypto backend lifecycle.
//!
//! The pure-Rust primitives need no global setup, but the library still
//! runs known-answer self tests once before first use and tracks whether
//! the backend is up so that init/shutdown pairing can be enforced.

use crate::digest::{digest, to_hex};
use crate::sign::{sign, SigningKey};
use sigill_core::{Error, Result, TransformId};
use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// (algorithm, input, expected hex)
const DIGEST_KATS: &[(TransformId, &[u8], &str)] = &[
    (TransformId::Sha1, b"abc", "a9993e364706816aba3e25717850c26c9cd0d89d"),
    (
        TransformId::Sha256,
        b"abc",
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    ),
];

/// RFC 4231 test case 2.
const HMAC_KAT: (&[u8], &[u8], &str) = (
    b"Jefe",
    b"what do ya want for nothing?",
    "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
);

/// Run the self tests and mark the backend initialized.
pub fn init() -> Result<()> {
    if INITIALIZED.load(Ordering::SeqCst) {
        return Err(Error::Init("crypto backend already initialized".into()));
    }
    self_test()?;
    INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .map_err(|_| Error::Init("crypto backend already initialized".into()))?;
    tracing::debug!("crypto backend initialized");
    Ok(())
}

/// Mark the backend shut down.
pub fn shutdown() -> Result<()> {
    INITIALIZED
        .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
        .map_err(|_| Error::Init("crypto backend is not initialized".into()))?;
    tracing::debug!("crypto backend shut down");
    Ok(())
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

fn self_test() -> Result<()> {
    for (id, input, expected) in DIGEST_KATS {
        let got = to_hex(&digest(*id, input)?);
        if got != *expected {
            return Err(Error::Init(format!("{id} self test failed")));
        }
    }
    let (key, data, expected) = HMAC_KAT;
    let got = to_hex(&sign(TransformId::HmacSha256, &SigningKey::Hmac(key), data)?);
    if got != expected {
        return Err(Error::Init("hmac-sha256 self test failed".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_tests_pass() {
        self_test().unwrap();
    }

    // The only test touching the global flag.
    #[test]
    fn init_shutdown_pairing() {
        assert!(!is_initialized());
        assert!(matches!(shutdown(), Err(Error::Init(_))));
        init().unwrap();
        assert!(is_initialized());
        assert!(matches!(init(), Err(Error::Init(_))));
        shutdown().unwrap();
        assert!(!is_initialized());
    }
}
