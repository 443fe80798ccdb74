#![forbid(unsafe_code)]

//! Process-wide security policy.
//!
//! The policy decides whether document processing may touch the local file
//! system or the network, for example when a Reference names a `file:` or
//! `http:` URI. It is installed once by `sigill::init` and removed by
//! `sigill::shutdown`. Without an installed policy, [`current`] reports the
//! locked-down default.

use crate::{Error, Result};
use std::sync::Mutex;

/// File and network permissions for document processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub read_file: bool,
    pub write_file: bool,
    pub create_directory: bool,
    pub read_network: bool,
    pub write_network: bool,
}

impl SecurityPolicy {
    /// Deny everything.
    pub const fn locked_down() -> Self {
        Self {
            read_file: false,
            write_file: false,
            create_directory: false,
            read_network: false,
            write_network: false,
        }
    }

    /// Fail with [`Error::PolicyDenied`] unless file reads are allowed.
    pub fn check_read_file(&self, target: &str) -> Result<()> {
        if self.read_file {
            Ok(())
        } else {
            Err(Error::PolicyDenied(format!("file read: {target}")))
        }
    }

    /// Fail with [`Error::PolicyDenied`] unless network reads are allowed.
    pub fn check_read_network(&self, target: &str) -> Result<()> {
        if self.read_network {
            Ok(())
        } else {
            Err(Error::PolicyDenied(format!("network read: {target}")))
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::locked_down()
    }
}

static INSTALLED: Mutex<Option<SecurityPolicy>> = Mutex::new(None);

/// Install the process-wide policy.
///
/// Fails with [`Error::Init`] if a policy is already installed.
pub fn install(policy: SecurityPolicy) -> Result<()> {
    let mut slot = INSTALLED
        .lock()
        .map_err(|_| Error::Init("security policy lock poisoned".into()))?;
    if slot.is_some() {
        return Err(Error::Init("security policy already installed".into()));
    }
    tracing::debug!(?policy, "installing security policy");
    *slot = Some(policy);
    Ok(())
}

/// Remove the installed policy and return it.
pub fn uninstall() -> Option<SecurityPolicy> {
    match INSTALLED.lock() {
        Ok(mut slot) => slot.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

/// Whether a policy is currently installed.
pub fn is_installed() -> bool {
    match INSTALLED.lock() {
        Ok(slot) => slot.is_some(),
        Err(poisoned) => poisoned.into_inner().is_some(),
    }
}

/// The installed policy, or [`SecurityPolicy::locked_down`] when none is.
pub fn current() -> SecurityPolicy {
    let slot = match INSTALLED.lock() {
        Ok(slot) => *slot,
        Err(poisoned) => *poisoned.into_inner(),
    };
    slot.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_down_denies_everything() {
        let policy = SecurityPolicy::locked_down();
        assert!(matches!(
            policy.check_read_file("/etc/passwd"),
            Err(Error::PolicyDenied(_))
        ));
        assert!(matches!(
            policy.check_read_network("http://example.com/"),
            Err(Error::PolicyDenied(_))
        ));
        assert_eq!(policy, SecurityPolicy::default());
    }

    #[test]
    fn permissive_policy_allows_reads() {
        let policy = SecurityPolicy {
            read_file: true,
            read_network: true,
            ..SecurityPolicy::locked_down()
        };
        assert!(policy.check_read_file("a.xml").is_ok());
        assert!(policy.check_read_network("http://example.com/").is_ok());
    }

    // Install/uninstall touch global state; keep them in one test.
    #[test]
    fn install_lifecycle() {
        assert_eq!(current(), SecurityPolicy::locked_down());
        let policy = SecurityPolicy {
            read_file: true,
            ..SecurityPolicy::locked_down()
        };
        install(policy).unwrap();
        assert!(is_installed());
        assert_eq!(current(), policy);
        assert!(matches!(install(policy), Err(Error::Init(_))));
        assert_eq!(uninstall(), Some(policy));
        assert!(!is_installed());
        assert_eq!(uninstall(), None);
        assert_eq!(current(), SecurityPolicy::locked_down());
    }
}
