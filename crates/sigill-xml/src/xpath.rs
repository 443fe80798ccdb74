#![forbid(unsafe_code)]

//! Minimal XPointer/ID support for same-document references.
//!
//! Only the patterns XML-DSig actually uses are supported:
//! - `#id-value` (bare-name pointer)
//! - `#xpointer(/)` (whole document, comments kept)
//! - `#xpointer(id('id-value'))` (subtree, comments kept)

use crate::document::{Document, NodeId};
use sigill_core::{ns, Error, Result};
use std::collections::{HashMap, HashSet};

/// Attribute names treated as IDs unless told otherwise.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// A parsed same-document reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameDocumentRef<'a> {
    /// `#xpointer(/)`
    Root,
    /// `#id`, comments excluded.
    Id(&'a str),
    /// `#xpointer(id('id'))`, comments kept.
    XPointerId(&'a str),
}

/// Parse a same-document reference. Returns `None` for anything that does
/// not start with `#`.
pub fn parse_same_document_ref(uri: &str) -> Option<SameDocumentRef<'_>> {
    let fragment = uri.strip_prefix('#')?;
    if fragment == "xpointer(/)" {
        return Some(SameDocumentRef::Root);
    }
    if let Some(id) = parse_xpointer_id(fragment) {
        return Some(SameDocumentRef::XPointerId(id));
    }
    Some(SameDocumentRef::Id(fragment))
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
pub fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix("xpointer(id(")?.strip_suffix("))")?;
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

/// ID value → element mapping. Values claimed by more than one element are
/// remembered so that a lookup can refuse them.
#[derive(Debug, Default)]
pub struct IdMap {
    ids: HashMap<String, NodeId>,
    duplicates: HashSet<String>,
}

impl IdMap {
    /// Scan `doc` for the default ID attributes plus `extra`. `xml:id` is
    /// always an ID. Extra names may be qualified (`wsu:Id`).
    pub fn build(doc: &Document, extra: &[String]) -> Self {
        let mut map = IdMap::default();
        for id in doc.descendants(doc.root()) {
            let Some(element) = doc.element(id) else {
                continue;
            };
            for attr in &element.attributes {
                let is_id = if attr.name.namespace_uri.as_deref() == Some(ns::XML) {
                    attr.name.local_name == "id"
                } else if attr.name.namespace_uri.is_none() {
                    DEFAULT_ID_ATTRS.contains(&attr.name.local_name.as_str())
                        || extra.iter().any(|e| *e == attr.name.local_name)
                } else {
                    let qualified = attr.name.qualified();
                    extra.iter().any(|e| *e == qualified)
                };
                if is_id {
                    map.insert(&attr.value, id);
                }
            }
        }
        map
    }

    fn insert(&mut self, value: &str, node: NodeId) {
        match self.ids.get(value) {
            Some(&existing) if existing != node => {
                self.duplicates.insert(value.to_owned());
            }
            Some(_) => {}
            None => {
                self.ids.insert(value.to_owned(), node);
            }
        }
    }

    /// Resolve an ID value to its element.
    pub fn resolve(&self, id: &str) -> Result<NodeId> {
        if self.duplicates.contains(id) {
            return Err(Error::XmlStructure(format!(
                "ID {id:?} is used by more than one element"
            )));
        }
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
