#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for sigill.
//!
//! Provides the digest and signature primitives XML-DSig needs, keyed by
//! [`sigill_core::TransformId`], plus the backend init/shutdown hooks.

pub mod backend;
pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
