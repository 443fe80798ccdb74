#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the enclosing `<Signature>` element from the node set.

use crate::pipeline::{Transform, TransformData};
use sigill_core::{Error, Result, TransformId};
use sigill_xml::{NodeId, NodeSet};
use std::borrow::Cow;

/// The enveloped signature transform: drops the `<Signature>` element and
/// its descendants from the node set.
pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    /// `signature` is the `<Signature>` element of the signed document.
    pub fn new(signature: NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn id(&self) -> TransformId {
        TransformId::Enveloped
    }

    fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>> {
        match input {
            TransformData::Xml {
                doc: Cow::Borrowed(doc),
                node_set,
            } => {
                let mut set = node_set.unwrap_or_else(|| NodeSet::all(doc));
                set.remove_subtree(doc, self.signature);
                Ok(TransformData::xml(doc, Some(set)))
            }
            TransformData::Xml {
                doc: Cow::Owned(_), ..
            } => Err(Error::Transform(
                "enveloped-signature transform applied to a document other than the signature's"
                    .into(),
            )),
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_core::ns;
    use sigill_xml::Document;

    #[test]
    fn removes_signature_subtree() {
        let doc = Document::parse(
            r#"<r><a/><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><x/></Signature></r>"#,
        )
        .unwrap();
        let signature = doc
            .find_element_from(doc.root(), ns::node::SIGNATURE, ns::DSIG)
            .unwrap();
        let out = EnvelopedSignatureTransform::new(signature)
            .execute(TransformData::xml(&doc, None))
            .unwrap();
        let TransformData::Xml {
            node_set: Some(set),
            ..
        } = &out
        else {
            panic!("expected a node set, got {out:?}");
        };
        assert!(!set.contains(signature));
        assert!(set.contains(doc.document_element().unwrap()));
        assert_eq!(out.to_binary().unwrap(), b"<r><a></a></r>");
    }

    #[test]
    fn rejects_octets() {
        let t = EnvelopedSignatureTransform::new(NodeId::new(1));
        assert!(matches!(
            t.execute(TransformData::Binary(b"<a/>".to_vec())),
            Err(Error::Transform(_))
        ));
    }
}
