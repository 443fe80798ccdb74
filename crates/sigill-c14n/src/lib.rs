#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for sigill.
//!
//! Implements all six W3C canonicalization variants:
//! - Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.1 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod inclusive11;
pub mod render;

use sigill_core::{Error, Result, TransformId};
use sigill_xml::{Document, NodeSet};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    pub fn transform_id(self) -> TransformId {
        match self {
            Self::Inclusive => TransformId::C14n,
            Self::InclusiveWithComments => TransformId::C14nWithComments,
            Self::Inclusive11 => TransformId::C14n11,
            Self::Inclusive11WithComments => TransformId::C14n11WithComments,
            Self::Exclusive => TransformId::ExcC14n,
            Self::ExclusiveWithComments => TransformId::ExcC14nWithComments,
        }
    }

    /// Get the algorithm URI for this mode.
    pub fn uri(self) -> &'static str {
        self.transform_id().uri()
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        TransformId::from_uri(uri).and_then(|id| Self::try_from(id).ok())
    }

    pub fn with_comments(self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments | Self::Inclusive11WithComments | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

impl TryFrom<TransformId> for C14nMode {
    type Error = Error;

    fn try_from(id: TransformId) -> Result<Self> {
        Ok(match id {
            TransformId::C14n => Self::Inclusive,
            TransformId::C14nWithComments => Self::InclusiveWithComments,
            TransformId::C14n11 => Self::Inclusive11,
            TransformId::C14n11WithComments => Self::Inclusive11WithComments,
            TransformId::ExcC14n => Self::Exclusive,
            TransformId::ExcC14nWithComments => Self::ExclusiveWithComments,
            other => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "{other} is not a canonicalization method"
                )))
            }
        })
    }
}

/// Canonicalize a document.
///
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces
///   PrefixList; ignored by the inclusive variants
pub fn canonicalize(
    doc: &Document,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    tracing::trace!(?mode, subset = node_set.is_some(), "canonicalizing");
    match mode {
        C14nMode::Inclusive | C14nMode::InclusiveWithComments => {
            inclusive::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Inclusive11 | C14nMode::Inclusive11WithComments => {
            inclusive11::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Exclusive | C14nMode::ExclusiveWithComments => {
            exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
        }
    }
}

/// Convenience: parse `xml` and canonicalize the whole document.
pub fn canonicalize_str(xml: &str, mode: C14nMode) -> Result<Vec<u8>> {
    let doc = Document::parse(xml)?;
    canonicalize(&doc, mode, None, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_transform_ids() {
        for id in TransformId::ALL.iter().copied() {
            match C14nMode::try_from(id) {
                Ok(mode) => {
                    assert!(id.is_canonicalization());
                    assert_eq!(mode.transform_id(), id);
                    assert_eq!(C14nMode::from_uri(id.uri()), Some(mode));
                }
                Err(_) => assert!(!id.is_canonicalization()),
            }
        }
        assert!(C14nMode::ExclusiveWithComments.is_exclusive());
        assert!(!C14nMode::Inclusive11.with_comments());
    }

    #[test]
    fn comments_follow_mode() {
        let xml = "<a><!--x--><b/></a>";
        assert_eq!(
            canonicalize_str(xml, C14nMode::Exclusive).unwrap(),
            b"<a><b></b></a>"
        );
        assert_eq!(
            canonicalize_str(xml, C14nMode::InclusiveWithComments).unwrap(),
            b"<a><!--x--><b></b></a>"
        );
    }
}
