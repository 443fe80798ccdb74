#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) for sigill.
//!
//! [`template`] builds `<Signature>` skeletons inside a document;
//! [`DsigContext`] signs them in place and verifies signed documents.

pub mod context;
pub mod sign;
mod signature;
pub mod template;
pub mod verify;

pub use context::{DsigContext, DsigStatus, ReferenceResult};
