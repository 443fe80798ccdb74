#![forbid(unsafe_code)]

//! Reading a `<Signature>` element into the pieces signing and
//! verification work on.

use base64::Engine;
use sigill_c14n::C14nMode;
use sigill_core::{ns, Error, Result, TransformId};
use sigill_transforms::pipeline::read_inclusive_prefixes;
use sigill_transforms::{resolve_uri, TransformPipeline};
use sigill_xml::xpath::IdMap;
use sigill_xml::{Document, NodeId, NodeSet};

pub(crate) struct SignatureNodes {
    pub signature: NodeId,
    pub signed_info: NodeId,
    pub c14n: C14nMode,
    pub c14n_prefixes: Vec<String>,
    pub signature_method: TransformId,
    pub hmac_output_bits: Option<usize>,
    pub signature_value: NodeId,
    pub references: Vec<ReferenceNodes>,
    pub key_info: Option<NodeId>,
}

pub(crate) struct ReferenceNodes {
    pub uri: String,
    pub digest_method: TransformId,
    pub digest_value: NodeId,
    pub transforms: Option<NodeId>,
}

impl SignatureNodes {
    pub fn parse(doc: &Document, signature: NodeId) -> Result<Self> {
        if !doc
            .element(signature)
            .is_some_and(|e| e.name.matches(ns::DSIG, ns::node::SIGNATURE))
        {
            return Err(Error::XmlStructure("node is not a dsig:Signature element".into()));
        }
        let signed_info = required_child(doc, signature, ns::node::SIGNED_INFO)?;

        let c14n_method = required_child(doc, signed_info, ns::node::CANONICALIZATION_METHOD)?;
        let c14n_id = algorithm_of(doc, c14n_method, ns::node::CANONICALIZATION_METHOD)?;
        let c14n = C14nMode::try_from(c14n_id)?;
        let c14n_prefixes = if c14n.is_exclusive() {
            read_inclusive_prefixes(doc, c14n_method)
        } else {
            Vec::new()
        };

        let method_node = required_child(doc, signed_info, ns::node::SIGNATURE_METHOD)?;
        let signature_method = algorithm_of(doc, method_node, ns::node::SIGNATURE_METHOD)?;
        if !signature_method.is_signature() {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{signature_method} cannot be used as SignatureMethod"
            )));
        }
        let hmac_output_bits = read_hmac_output_length(doc, method_node, signature_method)?;

        let references = doc
            .find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
            .into_iter()
            .map(|node| ReferenceNodes::parse(doc, node))
            .collect::<Result<Vec<_>>>()?;
        if references.is_empty() {
            return Err(Error::XmlStructure("SignedInfo has no Reference".into()));
        }

        let signature_value = required_child(doc, signature, ns::node::SIGNATURE_VALUE)?;
        let key_info = doc.find_child_element(signature, ns::DSIG, ns::node::KEY_INFO);

        tracing::debug!(
            c14n = %c14n_id,
            method = %signature_method,
            references = references.len(),
            "parsed Signature"
        );
        Ok(Self {
            signature,
            signed_info,
            c14n,
            c14n_prefixes,
            signature_method,
            hmac_output_bits,
            signature_value,
            references,
            key_info,
        })
    }

    /// The canonical form of `SignedInfo`, the octets that are signed.
    pub fn canonical_signed_info(&self, doc: &Document) -> Result<Vec<u8>> {
        let node_set = if self.c14n.with_comments() {
            NodeSet::tree_with_comments(doc, self.signed_info)
        } else {
            NodeSet::tree_without_comments(doc, self.signed_info)
        };
        let canonical = sigill_c14n::canonicalize(doc, self.c14n, Some(&node_set), &self.c14n_prefixes)?;
        tracing::trace!(
            signed_info = %String::from_utf8_lossy(&canonical),
            "canonical SignedInfo"
        );
        Ok(canonical)
    }
}

impl ReferenceNodes {
    fn parse(doc: &Document, node: NodeId) -> Result<Self> {
        let uri = doc
            .element(node)
            .and_then(|e| e.attribute(ns::attr::URI))
            .ok_or_else(|| Error::MissingAttribute("URI on Reference".into()))?
            .to_owned();
        let method = required_child(doc, node, ns::node::DIGEST_METHOD)?;
        let digest_method = algorithm_of(doc, method, ns::node::DIGEST_METHOD)?;
        if !digest_method.is_digest() {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{digest_method} cannot be used as DigestMethod"
            )));
        }
        Ok(Self {
            uri,
            digest_method,
            digest_value: required_child(doc, node, ns::node::DIGEST_VALUE)?,
            transforms: doc.find_child_element(node, ns::DSIG, ns::node::TRANSFORMS),
        })
    }

    /// Dereference, transform and digest. Returns the transformed octets
    /// together with their digest.
    pub fn digest(&self, doc: &Document, signature: NodeId, ids: &IdMap) -> Result<(Vec<u8>, Vec<u8>)> {
        let pipeline = TransformPipeline::from_transforms_node(doc, self.transforms, signature)?;
        let input = resolve_uri(doc, &self.uri, ids)?;
        let octets = pipeline.execute(input)?.into_binary()?;
        tracing::trace!(
            uri = %self.uri,
            pre_digest = %String::from_utf8_lossy(&octets),
            "reference pre-digest"
        );
        let digest = sigill_crypto::digest::digest(self.digest_method, &octets)?;
        Ok((octets, digest))
    }
}

/// Decode a base64 element value, ignoring whitespace.
pub(crate) fn decode_base64(doc: &Document, node: NodeId, what: &str) -> Result<Vec<u8>> {
    let text: String = doc
        .text_content(node)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

fn required_child(doc: &Document, parent: NodeId, local: &str) -> Result<NodeId> {
    doc.find_child_element(parent, ns::DSIG, local)
        .ok_or_else(|| Error::MissingElement(local.to_owned()))
}

fn algorithm_of(doc: &Document, node: NodeId, what: &str) -> Result<TransformId> {
    let uri = doc
        .element(node)
        .and_then(|e| e.attribute(ns::attr::ALGORITHM))
        .ok_or_else(|| Error::MissingAttribute(format!("Algorithm on {what}")))?;
    TransformId::from_uri(uri).ok_or_else(|| Error::UnsupportedAlgorithm(format!("{what}: {uri}")))
}

fn read_hmac_output_length(doc: &Document, method: NodeId, id: TransformId) -> Result<Option<usize>> {
    let Some(node) = doc.find_child_element(method, ns::DSIG, ns::node::HMAC_OUTPUT_LENGTH) else {
        return Ok(None);
    };
    if !id.is_hmac() {
        return Err(Error::XmlStructure(format!(
            "HMACOutputLength is not allowed with {id}"
        )));
    }
    let text = doc.text_content(node);
    text.trim()
        .parse()
        .map(Some)
        .map_err(|_| Error::XmlStructure(format!("invalid HMACOutputLength: {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r#"<doc><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo><CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"><ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="p"/></CanonicalizationMethod><SignatureMethod Algorithm="http://www.w3.org/2000/09/xmldsig#hmac-sha1"><HMACOutputLength>160</HMACOutputLength></SignatureMethod><Reference URI=""><DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/><DigestValue/></Reference></SignedInfo><SignatureValue/></Signature></doc>"#;

    fn signature_of(doc: &Document) -> NodeId {
        doc.find_element_from(doc.root(), ns::node::SIGNATURE, ns::DSIG)
            .unwrap()
    }

    #[test]
    fn reads_methods_and_references() {
        let doc = Document::parse(SIGNED).unwrap();
        let nodes = SignatureNodes::parse(&doc, signature_of(&doc)).unwrap();
        assert_eq!(nodes.c14n, C14nMode::Exclusive);
        assert_eq!(nodes.c14n_prefixes, vec!["p"]);
        assert_eq!(nodes.signature_method, TransformId::HmacSha1);
        assert_eq!(nodes.hmac_output_bits, Some(160));
        assert_eq!(nodes.references.len(), 1);
        assert_eq!(nodes.references[0].uri, "");
        assert_eq!(nodes.references[0].digest_method, TransformId::Sha1);
        assert!(nodes.key_info.is_none());
    }

    #[test]
    fn structural_defects() {
        let no_refs = SIGNED.replace(
            r#"<Reference URI=""><DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/><DigestValue/></Reference>"#,
            "",
        );
        let doc = Document::parse(&no_refs).unwrap();
        assert!(matches!(
            SignatureNodes::parse(&doc, signature_of(&doc)),
            Err(Error::XmlStructure(_))
        ));

        let unknown = SIGNED.replace("hmac-sha1", "hmac-md5");
        let doc = Document::parse(&unknown).unwrap();
        assert!(matches!(
            SignatureNodes::parse(&doc, signature_of(&doc)),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        let bad_length = SIGNED.replace(">160<", ">lots<");
        let doc = Document::parse(&bad_length).unwrap();
        assert!(matches!(
            SignatureNodes::parse(&doc, signature_of(&doc)),
            Err(Error::XmlStructure(_))
        ));

        let doc = Document::parse(SIGNED).unwrap();
        let root = doc.document_element().unwrap();
        assert!(SignatureNodes::parse(&doc, root).is_err());
    }

    #[test]
    fn base64_ignores_whitespace() {
        let doc = Document::parse("<v>\n  AAEC\n  Aw==\n</v>").unwrap();
        let v = doc.document_element().unwrap();
        assert_eq!(decode_base64(&doc, v, "value").unwrap(), vec![0, 1, 2, 3]);

        let doc = Document::parse("<v>not base64!</v>").unwrap();
        let v = doc.document_element().unwrap();
        assert!(matches!(decode_base64(&doc, v, "value"), Err(Error::Base64(_))));
    }
}
