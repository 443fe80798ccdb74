#![forbid(unsafe_code)]

//! Core types shared by every sigill crate: the error enum, algorithm URIs,
//! namespace constants, the [`TransformId`] registry and the process-wide
//! [`SecurityPolicy`].

pub mod algorithm;
pub mod error;
pub mod ns;
pub mod policy;
pub mod transform;

pub use error::{Error, Result};
pub use policy::SecurityPolicy;
pub use transform::{TransformId, TransformUsage};
