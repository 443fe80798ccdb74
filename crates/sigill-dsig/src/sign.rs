#![forbid(unsafe_code)]

//! XML-DSig signature creation.
//!
//! Fills a template in place: `KeyInfo` placeholders first, then every
//! `DigestValue` in document order, then `SignatureValue` over the
//! canonical `SignedInfo`.

use base64::Engine;
use sigill_core::{ns, Error, Result};
use sigill_keys::Key;
use sigill_xml::xpath::IdMap;
use sigill_xml::{Document, NodeId, NodeRef, QName};

use crate::context::{locate_signature, status_for, DsigContext, DsigStatus, ReferenceResult};
use crate::signature::SignatureNodes;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

impl DsigContext {
    /// Sign the `<Signature>` template at `node`.
    ///
    /// Failures of the pipeline are reported as [`Error::Sign`]; a stale
    /// handle or a destroyed context is reported as is.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn sign_node(&mut self, doc: &mut Document, node: NodeRef) -> Result<()> {
        self.ensure_alive()?;
        let signature = doc.resolve(node)?;
        self.reset();
        match self.run_sign(doc, signature) {
            Ok(()) => {
                self.status = DsigStatus::Succeeded;
                tracing::debug!(references = self.references.len(), "signature created");
                Ok(())
            }
            Err(e) => {
                self.status = status_for(&e);
                tracing::warn!(status = ?self.status, reason = %e, "signing failed");
                Err(e.into_sign_error())
            }
        }
    }

    /// Sign the first `<Signature>` under the document element.
    pub fn sign_document(&mut self, doc: &mut Document) -> Result<()> {
        self.ensure_alive()?;
        self.reset();
        let signature = locate_signature(doc)?;
        let node = doc.handle(signature);
        self.sign_node(doc, node)
    }

    fn run_sign(&mut self, doc: &mut Document, signature: NodeId) -> Result<()> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| Error::Key("no key bound to the signature context".into()))?;
        if !key.has_private_key() {
            return Err(Error::Key(format!(
                "{} key has no private material",
                key.algorithm_name()
            )));
        }

        let nodes = SignatureNodes::parse(doc, signature)?;
        let hmac_bits = self.hmac_output_bits(&nodes)?;
        if let Some(key_info) = nodes.key_info {
            fill_key_info(doc, key_info, key)?;
        }

        let ids = IdMap::build(doc, &self.id_attrs);
        for reference in &nodes.references {
            let (pre_digest, digest) = reference.digest(doc, nodes.signature, &ids)?;
            let encoded = BASE64.encode(&digest);
            tracing::debug!(uri = %reference.uri, method = %reference.digest_method, digest = %encoded, "reference digested");
            doc.set_text(reference.digest_value, &encoded)?;
            self.references.push(ReferenceResult {
                uri: reference.uri.clone(),
                digest_method: reference.digest_method,
                status: DsigStatus::Succeeded,
                pre_digest: self.store_pre_digest.then_some(pre_digest),
            });
        }

        let canonical = nodes.canonical_signed_info(doc)?;
        let algorithm = sigill_crypto::sign::from_id(nodes.signature_method, hmac_bits)?;
        let value = algorithm.sign(&key.signing_key(), &canonical)?;
        doc.set_text(nodes.signature_value, &BASE64.encode(&value))?;
        if self.store_pre_digest {
            self.signed_info_c14n = Some(canonical);
        }
        Ok(())
    }
}

/// Fill empty `KeyName` elements with the key name and empty `X509Data`
/// elements with the key's certificate chain.
fn fill_key_info(doc: &mut Document, key_info: NodeId, key: &Key) -> Result<()> {
    if let Some(name) = key.name() {
        for node in doc.find_child_elements(key_info, ns::DSIG, ns::node::KEY_NAME) {
            if doc.text_content(node).trim().is_empty() {
                doc.set_text(node, name)?;
            }
        }
    }
    if key.x509_chain.is_empty() {
        return Ok(());
    }
    for data in doc.find_child_elements(key_info, ns::DSIG, ns::node::X509_DATA) {
        if !doc.child_elements(data).is_empty() {
            continue;
        }
        let prefix = doc.element(data).and_then(|e| e.name.prefix.clone());
        for certificate in &key.x509_chain {
            let node = doc.append_element(
                data,
                QName::new(prefix.as_deref(), ns::node::X509_CERTIFICATE, ns::DSIG),
            )?;
            doc.set_text(node, &BASE64.encode(certificate))?;
        }
    }
    Ok(())
}
