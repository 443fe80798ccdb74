#![forbid(unsafe_code)]

//! Signature template construction.
//!
//! A template is a `<Signature>` skeleton injected into the caller's
//! document: algorithms and references are filled in, `DigestValue` and
//! `SignatureValue` stay empty until [`DsigContext::sign_node`] runs.
//!
//! [`DsigContext::sign_node`]: crate::DsigContext::sign_node

use sigill_core::{ns, Error, Result, TransformId};
use sigill_xml::{Document, NodeId, NodeRef, QName};

/// Create a `<Signature>` skeleton with the XML-DSig namespace as the
/// default namespace.
///
/// The skeleton is appended to the document element, or becomes the
/// document element when there is none. `id` of `None` or `""` writes no
/// `Id` attribute.
pub fn create_signature(
    doc: &mut Document,
    c14n: TransformId,
    signature_method: TransformId,
    id: Option<&str>,
) -> Result<NodeRef> {
    create_signature_with_prefix(doc, c14n, signature_method, id, None)
}

/// [`create_signature`], binding the XML-DSig namespace to `prefix`
/// (for example `ds`).
pub fn create_signature_with_prefix(
    doc: &mut Document,
    c14n: TransformId,
    signature_method: TransformId,
    id: Option<&str>,
    prefix: Option<&str>,
) -> Result<NodeRef> {
    if !c14n.is_canonicalization() {
        return Err(Error::Template(format!(
            "{c14n} cannot be used as CanonicalizationMethod"
        )));
    }
    if !signature_method.is_signature() {
        return Err(Error::Template(format!(
            "{signature_method} cannot be used as SignatureMethod"
        )));
    }
    build_signature(doc, c14n, signature_method, id, prefix.filter(|p| !p.is_empty()))
        .map_err(|e| Error::Template(e.to_string()))
}

fn build_signature(
    doc: &mut Document,
    c14n: TransformId,
    signature_method: TransformId,
    id: Option<&str>,
    prefix: Option<&str>,
) -> Result<NodeRef> {
    let parent = doc.document_element().unwrap_or_else(|| doc.root());
    let name = |local: &str| QName::new(prefix, local, ns::DSIG);

    let signature = doc.append_element(parent, name(ns::node::SIGNATURE))?;
    doc.declare_namespace(signature, prefix.unwrap_or(""), ns::DSIG)?;
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        doc.set_attribute(signature, ns::attr::ID, id)?;
    }

    let signed_info = doc.append_element(signature, name(ns::node::SIGNED_INFO))?;
    let c14n_method = doc.append_element(signed_info, name(ns::node::CANONICALIZATION_METHOD))?;
    doc.set_attribute(c14n_method, ns::attr::ALGORITHM, c14n.uri())?;
    let method = doc.append_element(signed_info, name(ns::node::SIGNATURE_METHOD))?;
    doc.set_attribute(method, ns::attr::ALGORITHM, signature_method.uri())?;
    doc.append_element(signature, name(ns::node::SIGNATURE_VALUE))?;

    tracing::debug!(%c14n, %signature_method, "created signature template");
    Ok(doc.handle(signature))
}

/// Append a `<Reference>` to the signature's `SignedInfo`.
///
/// The `URI` attribute is always written; `None` writes `URI=""`, which
/// selects the whole document.
pub fn add_reference(
    doc: &mut Document,
    signature: NodeRef,
    digest_method: TransformId,
    id: Option<&str>,
    uri: Option<&str>,
    reference_type: Option<&str>,
) -> Result<NodeRef> {
    append_reference(doc, signature, digest_method, id, uri, reference_type)
        .map_err(|e| Error::Reference(e.to_string()))
}

fn append_reference(
    doc: &mut Document,
    signature: NodeRef,
    digest_method: TransformId,
    id: Option<&str>,
    uri: Option<&str>,
    reference_type: Option<&str>,
) -> Result<NodeRef> {
    if !digest_method.is_digest() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{digest_method} cannot be used as DigestMethod"
        )));
    }
    let signature = expect_element(doc, signature, ns::node::SIGNATURE)?;
    let signed_info = doc
        .find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

    let name = dsig_name(doc, signature, ns::node::REFERENCE);
    let reference = doc.append_element(signed_info, name)?;
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        doc.set_attribute(reference, ns::attr::ID, id)?;
    }
    doc.set_attribute(reference, ns::attr::URI, uri.unwrap_or(""))?;
    if let Some(reference_type) = reference_type {
        doc.set_attribute(reference, ns::attr::TYPE, reference_type)?;
    }
    let name = dsig_name(doc, signature, ns::node::DIGEST_METHOD);
    let method = doc.append_element(reference, name)?;
    doc.set_attribute(method, ns::attr::ALGORITHM, digest_method.uri())?;
    let name = dsig_name(doc, signature, ns::node::DIGEST_VALUE);
    doc.append_element(reference, name)?;
    Ok(doc.handle(reference))
}

/// Append a `<Transform>` to a Reference, creating `<Transforms>` as the
/// Reference's first child if needed. Transforms run in insertion order.
pub fn add_transform(doc: &mut Document, reference: NodeRef, transform: TransformId) -> Result<NodeRef> {
    append_transform(doc, reference, transform).map_err(|e| Error::TransformAdd(e.to_string()))
}

fn append_transform(doc: &mut Document, reference: NodeRef, transform: TransformId) -> Result<NodeRef> {
    if !transform.is_reference_transform() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{transform} cannot be used as a reference transform"
        )));
    }
    let reference = expect_element(doc, reference, ns::node::REFERENCE)?;
    let transforms = match doc.find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS) {
        Some(existing) => existing,
        None => {
            let name = dsig_name(doc, reference, ns::node::TRANSFORMS);
            match doc.children(reference).first().copied() {
                Some(first) => doc.insert_element_before(reference, first, name)?,
                None => doc.append_element(reference, name)?,
            }
        }
    };
    let name = dsig_name(doc, reference, ns::node::TRANSFORM);
    let node = doc.append_element(transforms, name)?;
    doc.set_attribute(node, ns::attr::ALGORITHM, transform.uri())?;
    Ok(doc.handle(node))
}

/// Return the signature's `<KeyInfo>`, creating it right after
/// `SignatureValue` if absent.
pub fn ensure_key_info(doc: &mut Document, signature: NodeRef, id: Option<&str>) -> Result<NodeRef> {
    let signature = expect_element(doc, signature, ns::node::SIGNATURE).map_err(template_error)?;
    if let Some(existing) = doc.find_child_element(signature, ns::DSIG, ns::node::KEY_INFO) {
        return Ok(doc.handle(existing));
    }
    let value = doc
        .find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::Template("Signature has no SignatureValue".into()))?;
    let name = dsig_name(doc, signature, ns::node::KEY_INFO);
    let key_info = match doc.next_sibling(value) {
        Some(next) => doc.insert_element_before(signature, next, name),
        None => doc.append_element(signature, name),
    }
    .map_err(template_error)?;
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        doc.set_attribute(key_info, ns::attr::ID, id).map_err(template_error)?;
    }
    Ok(doc.handle(key_info))
}

/// Append an empty `<X509Data>`. Signing fills it with the key's
/// certificate chain.
pub fn add_x509_data(doc: &mut Document, key_info: NodeRef) -> Result<NodeRef> {
    append_to_key_info(doc, key_info, ns::node::X509_DATA, None)
}

/// Append a `<KeyName>`. An empty name is filled with the key's name at
/// signing time.
pub fn add_key_name(doc: &mut Document, key_info: NodeRef, name: Option<&str>) -> Result<NodeRef> {
    append_to_key_info(doc, key_info, ns::node::KEY_NAME, name)
}

fn append_to_key_info(
    doc: &mut Document,
    key_info: NodeRef,
    local: &str,
    text: Option<&str>,
) -> Result<NodeRef> {
    let key_info = expect_element(doc, key_info, ns::node::KEY_INFO).map_err(template_error)?;
    let name = dsig_name(doc, key_info, local);
    let node = doc.append_element(key_info, name).map_err(template_error)?;
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        doc.set_text(node, text).map_err(template_error)?;
    }
    Ok(doc.handle(node))
}

/// Add an exclusive C14N `<InclusiveNamespaces PrefixList="...">` to a
/// canonicalization `Transform` or `CanonicalizationMethod`.
pub fn add_inclusive_namespaces(doc: &mut Document, node: NodeRef, prefixes: &[&str]) -> Result<NodeRef> {
    append_inclusive_namespaces(doc, node, prefixes).map_err(template_error)
}

fn append_inclusive_namespaces(doc: &mut Document, node: NodeRef, prefixes: &[&str]) -> Result<NodeRef> {
    let id = doc.resolve(node)?;
    let algorithm = doc
        .element(id)
        .and_then(|e| e.attribute(ns::attr::ALGORITHM))
        .and_then(TransformId::from_uri);
    if !matches!(
        algorithm,
        Some(TransformId::ExcC14n | TransformId::ExcC14nWithComments)
    ) {
        return Err(Error::XmlStructure(
            "InclusiveNamespaces needs an exclusive C14N algorithm".into(),
        ));
    }
    let child = doc.append_element(
        id,
        QName::new(Some("ec"), ns::node::INCLUSIVE_NAMESPACES, ns::EXC_C14N),
    )?;
    doc.declare_namespace(child, "ec", ns::EXC_C14N)?;
    doc.set_attribute(child, ns::attr::PREFIX_LIST, &prefixes.join(" "))?;
    Ok(doc.handle(child))
}

/// Add `<HMACOutputLength>` to the signature's `SignatureMethod`.
pub fn add_hmac_output_length(doc: &mut Document, signature: NodeRef, bits: usize) -> Result<NodeRef> {
    set_hmac_output_length(doc, signature, bits).map_err(template_error)
}

fn set_hmac_output_length(doc: &mut Document, signature: NodeRef, bits: usize) -> Result<NodeRef> {
    let signature = expect_element(doc, signature, ns::node::SIGNATURE)?;
    let method = doc
        .find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .and_then(|si| doc.find_child_element(si, ns::DSIG, ns::node::SIGNATURE_METHOD))
        .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))?;
    let is_hmac = doc
        .element(method)
        .and_then(|e| e.attribute(ns::attr::ALGORITHM))
        .and_then(TransformId::from_uri)
        .is_some_and(TransformId::is_hmac);
    if !is_hmac {
        return Err(Error::XmlStructure(
            "HMACOutputLength needs an HMAC SignatureMethod".into(),
        ));
    }
    let node = match doc.find_child_element(method, ns::DSIG, ns::node::HMAC_OUTPUT_LENGTH) {
        Some(existing) => existing,
        None => {
            let name = dsig_name(doc, signature, ns::node::HMAC_OUTPUT_LENGTH);
            doc.append_element(method, name)?
        }
    };
    doc.set_text(node, &bits.to_string())?;
    Ok(doc.handle(node))
}

/// Add the `<XPath>` expression of an XPath `Transform`. `namespaces`
/// are declared on the `<XPath>` element for use by the expression.
pub fn add_xpath(
    doc: &mut Document,
    transform: NodeRef,
    expression: &str,
    namespaces: &[(&str, &str)],
) -> Result<NodeRef> {
    append_xpath(doc, transform, expression, namespaces).map_err(template_error)
}

fn append_xpath(
    doc: &mut Document,
    transform: NodeRef,
    expression: &str,
    namespaces: &[(&str, &str)],
) -> Result<NodeRef> {
    let transform = expect_element(doc, transform, ns::node::TRANSFORM)?;
    let name = dsig_name(doc, transform, ns::node::XPATH);
    let node = doc.append_element(transform, name)?;
    for (prefix, uri) in namespaces {
        doc.declare_namespace(node, prefix, uri)?;
    }
    doc.set_text(node, expression)?;
    Ok(doc.handle(node))
}

fn template_error(err: Error) -> Error {
    match err {
        Error::Template(_) => err,
        other => Error::Template(other.to_string()),
    }
}

/// Resolve `node` and check that it is an XML-DSig element named `local`.
fn expect_element(doc: &Document, node: NodeRef, local: &str) -> Result<NodeId> {
    let id = doc.resolve(node)?;
    match doc.element(id) {
        Some(e) if e.name.matches(ns::DSIG, local) => Ok(id),
        Some(e) => Err(Error::XmlStructure(format!(
            "expected {local}, found {}",
            e.name.qualified()
        ))),
        None => Err(Error::XmlStructure(format!("expected {local}, found a non-element"))),
    }
}

/// A name in the XML-DSig namespace using the prefix of `anchor`.
fn dsig_name(doc: &Document, anchor: NodeId, local: &str) -> QName {
    let prefix = doc.element(anchor).and_then(|e| e.name.prefix.clone());
    QName::new(prefix.as_deref(), local, ns::DSIG)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        Document::parse("<Envelope><Data>payload</Data></Envelope>").unwrap()
    }

    #[test]
    fn skeleton_is_appended_to_document_element() {
        let mut doc = document();
        let sig = create_signature(&mut doc, TransformId::ExcC14n, TransformId::RsaSha256, None)
            .unwrap();
        let id = doc.resolve(sig).unwrap();
        assert_eq!(doc.parent(id), doc.document_element());
        assert_eq!(
            doc.to_xml(),
            concat!(
                "<Envelope><Data>payload</Data>",
                r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo>"#,
                r#"<CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
                "</SignedInfo><SignatureValue/></Signature></Envelope>"
            )
        );
    }

    #[test]
    fn skeleton_becomes_root_of_empty_document() {
        let mut doc = Document::new();
        let sig = create_signature_with_prefix(
            &mut doc,
            TransformId::C14n,
            TransformId::HmacSha256,
            Some("sig-1"),
            Some("ds"),
        )
        .unwrap();
        assert_eq!(doc.document_element_ref().unwrap(), sig);
        let xml = doc.to_xml();
        assert!(xml.starts_with(r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="sig-1">"#));
        assert!(xml.contains("<ds:SignatureValue/>"));
    }

    #[test]
    fn wrong_usages_are_rejected() {
        let mut doc = document();
        assert!(matches!(
            create_signature(&mut doc, TransformId::Sha256, TransformId::RsaSha256, None),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            create_signature(&mut doc, TransformId::C14n, TransformId::Sha256, None),
            Err(Error::Template(_))
        ));
        let sig = create_signature(&mut doc, TransformId::C14n, TransformId::RsaSha1, Some(""))
            .unwrap();
        assert!(doc.element(sig.id()).unwrap().attribute("Id").is_none());
        assert!(matches!(
            add_reference(&mut doc, sig, TransformId::RsaSha1, None, None, None),
            Err(Error::Reference(_))
        ));
        let reference =
            add_reference(&mut doc, sig, TransformId::Sha1, None, None, None).unwrap();
        assert!(matches!(
            add_transform(&mut doc, reference, TransformId::Sha1),
            Err(Error::TransformAdd(_))
        ));
        assert!(matches!(
            add_transform(&mut doc, sig, TransformId::Enveloped),
            Err(Error::TransformAdd(_))
        ));
    }

    #[test]
    fn reference_always_has_uri_and_keeps_transform_order() {
        let mut doc = document();
        let sig = create_signature(&mut doc, TransformId::C14n, TransformId::RsaSha256, None)
            .unwrap();
        let reference = add_reference(
            &mut doc,
            sig,
            TransformId::Sha256,
            Some("ref-1"),
            None,
            Some("urn:type"),
        )
        .unwrap();
        add_transform(&mut doc, reference, TransformId::Enveloped).unwrap();
        add_transform(&mut doc, reference, TransformId::ExcC14n).unwrap();
        add_transform(&mut doc, reference, TransformId::Base64).unwrap();

        let xml = doc.node_to_xml(reference.id());
        assert_eq!(
            xml,
            concat!(
                r#"<Reference Id="ref-1" URI="" Type="urn:type"><Transforms>"#,
                r#"<Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"#,
                r#"<Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<Transform Algorithm="http://www.w3.org/2000/09/xmldsig#base64"/>"#,
                r#"</Transforms><DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
                "<DigestValue/></Reference>"
            )
        );
    }

    #[test]
    fn key_info_is_idempotent_and_follows_signature_value() {
        let mut doc = document();
        let sig = create_signature(&mut doc, TransformId::C14n, TransformId::RsaSha256, None)
            .unwrap();
        let first = ensure_key_info(&mut doc, sig, None).unwrap();
        let second = ensure_key_info(&mut doc, sig, Some("ignored")).unwrap();
        assert_eq!(first, second);
        let value = doc
            .find_child_element(sig.id(), ns::DSIG, ns::node::SIGNATURE_VALUE)
            .unwrap();
        assert_eq!(doc.next_sibling(value), Some(first.id()));

        add_key_name(&mut doc, first, Some("signer")).unwrap();
        add_x509_data(&mut doc, first).unwrap();
        assert_eq!(
            doc.node_to_xml(first.id()),
            "<KeyInfo><KeyName>signer</KeyName><X509Data/></KeyInfo>"
        );
        assert!(matches!(
            add_x509_data(&mut doc, sig),
            Err(Error::Template(_))
        ));
    }

    #[test]
    fn stale_handles_are_refused() {
        let mut doc = document();
        let sig = create_signature(&mut doc, TransformId::C14n, TransformId::RsaSha256, None)
            .unwrap();
        doc.detach(sig.id()).unwrap();
        assert!(matches!(
            add_reference(&mut doc, sig, TransformId::Sha256, None, None, None),
            Err(Error::Reference(_))
        ));

        let other = document();
        let foreign = other.document_element_ref().unwrap();
        assert!(matches!(
            add_transform(&mut doc, foreign, TransformId::Enveloped),
            Err(Error::TransformAdd(_))
        ));
    }

    #[test]
    fn optional_children() {
        let mut doc = document();
        let sig = create_signature(&mut doc, TransformId::ExcC14n, TransformId::HmacSha256, None)
            .unwrap();
        add_hmac_output_length(&mut doc, sig, 128).unwrap();
        let reference = add_reference(&mut doc, sig, TransformId::Sha256, None, None, None).unwrap();
        let exc = add_transform(&mut doc, reference, TransformId::ExcC14n).unwrap();
        add_inclusive_namespaces(&mut doc, exc, &["a", "b"]).unwrap();
        let xpath = add_transform(&mut doc, reference, TransformId::XPath).unwrap();
        add_xpath(
            &mut doc,
            xpath,
            "not(ancestor-or-self::dsig:Signature)",
            &[("dsig", ns::DSIG)],
        )
        .unwrap();

        let xml = doc.to_xml();
        assert!(xml.contains("<HMACOutputLength>128</HMACOutputLength>"));
        assert!(xml.contains(
            r#"<ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="a b"/>"#
        ));
        assert!(xml.contains(
            r#"<XPath xmlns:dsig="http://www.w3.org/2000/09/xmldsig#">not(ancestor-or-self::dsig:Signature)</XPath>"#
        ));
        assert!(matches!(
            add_inclusive_namespaces(&mut doc, xpath, &["a"]),
            Err(Error::Template(_))
        ));
    }
}
