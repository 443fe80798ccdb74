#![forbid(unsafe_code)]

//! Canonical XML 1.1.
//!
//! Algorithm URI: `http://www.w3.org/2006/12/xml-c14n11`
//! With comments: `http://www.w3.org/2006/12/xml-c14n11#WithComments`
//!
//! Same as 1.0 except for how an orphaned subset root inherits `xml:*`
//! attributes: `xml:id` is never inherited.

use sigill_core::Result;
use sigill_xml::{Document, NodeSet};

pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>> {
    crate::inclusive::run(doc, with_comments, node_set, inherit_xml_attr_11)
}

// TODO: join relative xml:base values with the inherited base instead of
// copying the nearest one (C14N 1.1 section 2.4).
fn inherit_xml_attr_11(local_name: &str) -> bool {
    local_name != "id"
}
