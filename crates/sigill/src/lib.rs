#![forbid(unsafe_code)]

//! sigill: XML digital signatures in pure Rust.
//!
//! Call [`init`] once before any other use and [`shutdown`] at the end.

pub mod lifecycle;

pub use lifecycle::{init, init_with_policy, shutdown};

pub use sigill_c14n as c14n;
pub use sigill_core as core;
pub use sigill_crypto as crypto;
pub use sigill_dsig as dsig;
pub use sigill_keys as keys;
pub use sigill_transforms as transforms;
pub use sigill_xml as xml;

pub use sigill_core::{Error, Result, SecurityPolicy, TransformId};
pub use sigill_dsig::{template, DsigContext, DsigStatus};
pub use sigill_keys::{Key, KeyDataFormat};
pub use sigill_xml::{Document, NodeRef};
