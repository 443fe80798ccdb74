#![forbid(unsafe_code)]

//! DSig context: the bound key, configuration and the outcome of the last
//! sign or verify run.

use sigill_core::{ns, Error, Result, TransformId};
use sigill_crypto::sign::{self, HMAC_MIN_OUTPUT_BITS};
use sigill_keys::Key;
use sigill_xml::{Document, NodeId};

use crate::signature::SignatureNodes;

/// Outcome of the last operation run on a [`DsigContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DsigStatus {
    /// Nothing has run yet.
    #[default]
    NotRun,
    Succeeded,
    /// The Signature could not be processed: missing elements, unknown
    /// algorithms, bad encodings, unresolvable references.
    FailedStructure,
    /// The Signature was processed and does not hold: a digest or the
    /// signature value did not match, or the key cannot check it.
    FailedInvalid,
}

/// Per-Reference outcome, in document order.
#[derive(Debug, Clone)]
pub struct ReferenceResult {
    pub uri: String,
    pub digest_method: TransformId,
    pub status: DsigStatus,
    /// The transformed octets that were digested, kept when
    /// [`DsigContext::store_pre_digest`] is set.
    pub pre_digest: Option<Vec<u8>>,
}

/// Context for XML-DSig operations.
///
/// One context serves one operation at a time. [`DsigContext::destroy`]
/// releases the key early; afterwards every operation fails with
/// [`Error::InvalidContext`].
#[derive(Debug)]
pub struct DsigContext {
    pub(crate) key: Option<Key>,
    pub(crate) status: DsigStatus,
    pub(crate) references: Vec<ReferenceResult>,
    pub(crate) signed_info_c14n: Option<Vec<u8>>,
    destroyed: bool,
    /// Additional ID attribute names to register.
    pub id_attrs: Vec<String>,
    /// Keep the pre-digest octets of every Reference and the canonical
    /// SignedInfo.
    pub store_pre_digest: bool,
    /// Minimum HMAC output length in bits accepted from `HMACOutputLength`.
    pub hmac_min_out_len: usize,
}

impl Default for DsigContext {
    fn default() -> Self {
        Self {
            key: None,
            status: DsigStatus::NotRun,
            references: Vec::new(),
            signed_info_c14n: None,
            destroyed: false,
            id_attrs: Vec::new(),
            store_pre_digest: false,
            hmac_min_out_len: HMAC_MIN_OUTPUT_BITS,
        }
    }
}

impl DsigContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with `key` already bound.
    pub fn with_key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Bind `key`, handing back the previously bound key if any.
    pub fn set_key(&mut self, key: Key) -> Result<Option<Key>> {
        self.ensure_alive()?;
        Ok(self.key.replace(key))
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Add an ID attribute name to register during processing.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    pub fn status(&self) -> DsigStatus {
        self.status
    }

    /// Results of the last run, one per Reference.
    pub fn references(&self) -> &[ReferenceResult] {
        &self.references
    }

    /// Canonical SignedInfo of the last run, if `store_pre_digest` is set.
    pub fn signed_info_c14n(&self) -> Option<&[u8]> {
        self.signed_info_c14n.as_deref()
    }

    /// Release the key and the results of the last run.
    pub fn destroy(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.destroyed = true;
        self.key = None;
        self.reset();
        tracing::debug!("signature context destroyed");
        Ok(())
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(Error::InvalidContext)
        } else {
            Ok(())
        }
    }

    pub(crate) fn reset(&mut self) {
        self.status = DsigStatus::NotRun;
        self.references.clear();
        self.signed_info_c14n = None;
    }

    /// The `HMACOutputLength` to apply, if it is acceptable.
    pub(crate) fn hmac_output_bits(&self, nodes: &SignatureNodes) -> Result<Option<usize>> {
        match nodes.hmac_output_bits {
            None => Ok(None),
            Some(bits)
                if sign::hmac_output_bits_allowed(
                    nodes.signature_method,
                    bits,
                    self.hmac_min_out_len,
                ) =>
            {
                Ok(Some(bits))
            }
            Some(bits) => Err(Error::Crypto(format!(
                "HMACOutputLength of {bits} bits is not acceptable for {}",
                nodes.signature_method
            ))),
        }
    }
}

/// The `<Signature>` directly processed by `sign_document` and
/// `verify_document`.
pub(crate) fn locate_signature(doc: &Document) -> Result<NodeId> {
    let root = doc
        .document_element()
        .ok_or_else(|| Error::InvalidDocument("document has no root element".into()))?;
    doc.find_element_from(root, ns::node::SIGNATURE, ns::DSIG)
        .ok_or_else(|| Error::NodeNotFound(format!("{{{}}}{}", ns::DSIG, ns::node::SIGNATURE)))
}

/// Map a pipeline failure to the status it leaves behind.
pub(crate) fn status_for(err: &Error) -> DsigStatus {
    match err {
        Error::DigestMismatch(_) | Error::SignatureInvalid(_) | Error::Key(_) | Error::Crypto(_) => {
            DsigStatus::FailedInvalid
        }
        _ => DsigStatus::FailedStructure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_keys::KeyData;

    fn hmac_key(name: &str) -> Key {
        Key::new(KeyData::Hmac(b"secret".to_vec())).with_name(name)
    }

    #[test]
    fn rebinding_hands_back_the_previous_key() {
        let mut ctx = DsigContext::new();
        assert_eq!(ctx.status(), DsigStatus::NotRun);
        assert_eq!(ctx.hmac_min_out_len, 80);
        assert!(ctx.set_key(hmac_key("first")).unwrap().is_none());
        let previous = ctx.set_key(hmac_key("second")).unwrap().unwrap();
        assert_eq!(previous.name(), Some("first"));
        assert_eq!(ctx.key().and_then(Key::name), Some("second"));
    }

    #[test]
    fn destroyed_context_refuses_everything() {
        let mut ctx = DsigContext::with_key(hmac_key("k"));
        ctx.destroy().unwrap();
        assert!(ctx.key().is_none());
        assert!(matches!(ctx.destroy(), Err(Error::InvalidContext)));
        assert!(matches!(ctx.set_key(hmac_key("k")), Err(Error::InvalidContext)));
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(
            status_for(&Error::DigestMismatch("#a".into())),
            DsigStatus::FailedInvalid
        );
        assert_eq!(status_for(&Error::Key("no key".into())), DsigStatus::FailedInvalid);
        assert_eq!(
            status_for(&Error::MissingElement("SignedInfo".into())),
            DsigStatus::FailedStructure
        );
        assert_eq!(
            status_for(&Error::Base64("SignatureValue".into())),
            DsigStatus::FailedStructure
        );
    }

    #[test]
    fn missing_signature_is_not_found() {
        let doc = Document::parse("<doc><Signature/></doc>").unwrap();
        assert!(matches!(locate_signature(&doc), Err(Error::NodeNotFound(_))));
    }
}
