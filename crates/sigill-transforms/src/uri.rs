#![forbid(unsafe_code)]

//! URI dereferencing for XML-DSig references.
//!
//! Handles:
//! - `""`: the whole document, comments removed
//! - `#id`: the identified element's subtree, comments removed
//! - `#xpointer(/)` and `#xpointer(id('id'))`: as above, comments kept
//! - `file:` and relative references: read from disk, if the security
//!   policy allows it
//! - `http:` / `https:`: checked against the policy, never fetched

use crate::pipeline::TransformData;
use sigill_core::{policy, Error, Result};
use sigill_xml::xpath::{self, IdMap, SameDocumentRef};
use sigill_xml::{Document, NodeSet};

/// Dereference a Reference `URI` against `doc`.
pub fn resolve_uri<'d>(doc: &'d Document, uri: &str, ids: &IdMap) -> Result<TransformData<'d>> {
    if uri.is_empty() {
        return Ok(TransformData::xml(doc, Some(NodeSet::all_without_comments(doc))));
    }
    if let Some(reference) = xpath::parse_same_document_ref(uri) {
        let set = match reference {
            SameDocumentRef::Root => NodeSet::all(doc),
            SameDocumentRef::Id(id) => NodeSet::tree_without_comments(doc, ids.resolve(id)?),
            SameDocumentRef::XPointerId(id) => {
                NodeSet::tree_with_comments(doc, ids.resolve(id)?)
            }
        };
        return Ok(TransformData::xml(doc, Some(set)));
    }
    resolve_external(uri)
}

fn resolve_external(uri: &str) -> Result<TransformData<'static>> {
    let policy = policy::current();
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("http:") || lower.starts_with("https:") {
        policy.check_read_network(uri)?;
        return Err(Error::InvalidUri(format!("network references are not supported: {uri}")));
    }
    let path = if let Some(rest) = uri.strip_prefix("file:") {
        file_uri_path(rest)
    } else if has_scheme(uri) {
        return Err(Error::InvalidUri(format!("unsupported URI scheme: {uri}")));
    } else {
        uri
    };
    policy.check_read_file(path)?;
    tracing::debug!(path, "reading external reference");
    Ok(TransformData::Binary(std::fs::read(path)?))
}

/// `//host/path` → `/path`; anything else is taken as a path.
fn file_uri_path(rest: &str) -> &str {
    match rest.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map_or(authority_and_path, |slash| &authority_and_path[slash..]),
        None => rest,
    }
}

fn has_scheme(uri: &str) -> bool {
    match uri.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
