#![forbid(unsafe_code)]

//! XML document model for sigill.
//!
//! Provides a mutable arena document built from `roxmltree`, validated node
//! handles, `NodeSet` operations needed by canonicalization and transforms,
//! and a serializer.

pub mod document;
pub mod nodeset;
pub mod writer;
pub mod xpath;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, NodeRef, QName};
pub use nodeset::NodeSet;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree never loads external entities, so internal DTD subsets are
/// safe to accept.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}
