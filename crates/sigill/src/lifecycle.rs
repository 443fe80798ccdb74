#![forbid(unsafe_code)]

//! Process-wide setup and teardown.
//!
//! Neither function is reentrant: callers serialize [`init`] and
//! [`shutdown`] around every other use of the library.

use sigill_core::{policy, Result, SecurityPolicy};

/// Install the locked-down [`SecurityPolicy`] and bring up the crypto
/// backend.
///
/// Fails with [`sigill_core::Error::Init`] when already initialized or when
/// the backend self tests fail.
pub fn init() -> Result<()> {
    init_with_policy(SecurityPolicy::locked_down())
}

/// [`init`] with a caller-chosen policy.
pub fn init_with_policy(security: SecurityPolicy) -> Result<()> {
    policy::install(security)?;
    if let Err(e) = sigill_crypto::backend::init() {
        policy::uninstall();
        return Err(e);
    }
    tracing::info!(?security, "sigill initialized");
    Ok(())
}

/// Shut the crypto backend down and remove the policy.
///
/// Must only follow a successful [`init`]; this is not checked beyond what
/// the backend reports.
pub fn shutdown() -> Result<()> {
    sigill_crypto::backend::shutdown()?;
    policy::uninstall();
    tracing::info!("sigill shut down");
    Ok(())
}
