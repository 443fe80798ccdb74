#![forbid(unsafe_code)]

//! Sortable namespace and attribute records shared by the C14N variants.

use crate::escape;
use sigill_xml::{Attribute, NodeId};
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// "" for the default namespace.
    pub prefix: String,
    pub uri: String,
}

impl NsDecl {
    pub fn new(prefix: &str, uri: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            uri: uri.to_owned(),
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        out.extend_from_slice(escape::escape_attr(&self.uri).as_bytes());
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    /// Default namespace first, then by prefix.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// "" for no namespace.
    pub ns_uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn from_attribute(attr: &Attribute) -> Self {
        Self {
            ns_uri: attr.name.namespace_uri.clone().unwrap_or_default(),
            local_name: attr.name.local_name.clone(),
            qualified_name: attr.name.qualified(),
            value: attr.value.clone(),
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape::escape_attr(&self.value).as_bytes());
        out.push(b'"');
    }
}

impl Ord for Attr {
    /// Unqualified attributes first (by local name), then by
    /// (namespace URI, local name).
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Write a start tag.
pub fn write_start_tag(out: &mut Vec<u8>, name: &str, ns_decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for decl in ns_decls {
        decl.write(out);
    }
    for attr in attrs {
        attr.write(out);
    }
    out.push(b'>');
}

pub fn write_end_tag(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(name.as_bytes());
    out.push(b'>');
}

/// Comments and PIs outside the document element are separated from it by
/// a newline on the side facing the element.
pub fn write_top_level<F>(
    doc: &sigill_xml::Document,
    id: NodeId,
    out: &mut Vec<u8>,
    body: F,
) where
    F: FnOnce(&mut Vec<u8>),
{
    let top_level = doc
        .parent(id)
        .is_some_and(|p| p == doc.root());
    if top_level && has_element_sibling(doc, id, true) {
        out.push(b'\n');
    }
    body(out);
    if top_level && has_element_sibling(doc, id, false) {
        out.push(b'\n');
    }
}

fn has_element_sibling(doc: &sigill_xml::Document, id: NodeId, preceding: bool) -> bool {
    let mut sib = if preceding {
        doc.previous_sibling(id)
    } else {
        doc.next_sibling(id)
    };
    while let Some(s) = sib {
        if doc.is_element(s) {
            return true;
        }
        sib = if preceding {
            doc.previous_sibling(s)
        } else {
            doc.next_sibling(s)
        };
    }
    false
}

/// Render a comment or processing instruction (shared by all variants).
pub fn write_misc(doc: &sigill_xml::Document, id: NodeId, out: &mut Vec<u8>) {
    match doc.node_kind(id) {
        Some(sigill_xml::NodeKind::Comment(text)) => write_top_level(doc, id, out, |out| {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }),
        Some(sigill_xml::NodeKind::ProcessingInstruction(pi)) => {
            write_top_level(doc, id, out, |out| {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(pi.target.as_bytes());
                if let Some(data) = pi.data.as_deref().filter(|d| !d.is_empty()) {
                    out.push(b' ');
                    out.extend_from_slice(escape::escape_pi(data).as_bytes());
                }
                out.extend_from_slice(b"?>");
            })
        }
        _ => {}
    }
}
