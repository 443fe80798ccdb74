#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Read `SignedInfo`: CanonicalizationMethod, SignatureMethod, References
//! 2. For each Reference: resolve URI, run transforms, digest, compare
//! 3. Canonicalize `SignedInfo`
//! 4. Check `SignatureValue` with the bound key
//!
//! The document is never modified.

use sigill_core::{Error, Result};
use sigill_xml::xpath::IdMap;
use sigill_xml::{Document, NodeId, NodeRef};

use crate::context::{locate_signature, status_for, DsigContext, DsigStatus, ReferenceResult};
use crate::signature::{decode_base64, SignatureNodes};

impl DsigContext {
    /// Verify the `<Signature>` at `node`.
    ///
    /// `Ok(())` is returned only when every Reference digest matches and
    /// the signature value verifies. Anything else is
    /// [`Error::Verification`] and [`DsigContext::status`] tells structural
    /// defects apart from invalid signatures.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn verify_node(&mut self, doc: &Document, node: NodeRef) -> Result<()> {
        self.ensure_alive()?;
        let signature = doc.resolve(node)?;
        self.reset();
        let outcome = self.run_verify(doc, signature).and_then(|status| match status {
            DsigStatus::Succeeded => Ok(()),
            other => Err(Error::SignatureInvalid(format!(
                "verification ended with status {other:?}"
            ))),
        });
        if let Err(e) = outcome {
            self.status = status_for(&e);
            tracing::warn!(status = ?self.status, reason = %e, "signature verification failed");
            return Err(Error::Verification(e.to_string()));
        }
        self.status = DsigStatus::Succeeded;
        tracing::debug!(references = self.references.len(), "signature verified");
        Ok(())
    }

    /// Verify the first `<Signature>` under the document element.
    pub fn verify_document(&mut self, doc: &Document) -> Result<()> {
        self.ensure_alive()?;
        self.reset();
        let signature = locate_signature(doc)?;
        self.verify_node(doc, doc.handle(signature))
    }

    /// Check every Reference and the signature value. The returned status is
    /// derived from the recorded reference results.
    fn run_verify(&mut self, doc: &Document, signature: NodeId) -> Result<DsigStatus> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| Error::Key("no key bound to the signature context".into()))?;
        let nodes = SignatureNodes::parse(doc, signature)?;
        let hmac_bits = self.hmac_output_bits(&nodes)?;

        let ids = IdMap::build(doc, &self.id_attrs);
        let mut mismatched = Vec::new();
        for reference in &nodes.references {
            let (pre_digest, computed) = reference.digest(doc, nodes.signature, &ids)?;
            let stored = decode_base64(doc, reference.digest_value, "DigestValue")?;
            let status = if stored == computed {
                DsigStatus::Succeeded
            } else {
                mismatched.push(reference.uri.clone());
                DsigStatus::FailedInvalid
            };
            tracing::debug!(uri = %reference.uri, method = %reference.digest_method, ?status, "reference checked");
            self.references.push(ReferenceResult {
                uri: reference.uri.clone(),
                digest_method: reference.digest_method,
                status,
                pre_digest: self.store_pre_digest.then_some(pre_digest),
            });
        }
        if !mismatched.is_empty() {
            return Err(Error::DigestMismatch(format!("URI {mismatched:?}")));
        }

        let value = decode_base64(doc, nodes.signature_value, "SignatureValue")?;
        if value.is_empty() {
            return Err(Error::SignatureInvalid("SignatureValue is empty".into()));
        }
        let canonical = nodes.canonical_signed_info(doc)?;
        let algorithm = sigill_crypto::sign::from_id(nodes.signature_method, hmac_bits)?;
        let valid = algorithm.verify(&key.signing_key(), &canonical, &value)?;
        if self.store_pre_digest {
            self.signed_info_c14n = Some(canonical);
        }
        if !valid {
            return Err(Error::SignatureInvalid(format!(
                "{} signature value does not match",
                nodes.signature_method
            )));
        }
        let all_matched = !self.references.is_empty()
            && self
                .references
                .iter()
                .all(|r| r.status == DsigStatus::Succeeded);
        Ok(if all_matched {
            DsigStatus::Succeeded
        } else {
            DsigStatus::FailedInvalid
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template;
    use sigill_core::{ns, policy, TransformId};
    use sigill_keys::{Key, KeyData, KeyDataFormat};

    const RSA_PEM: &[u8] = include_bytes!("../../../test-data/keys/rsa-2048.pem");
    const RSA_PUB: &[u8] = include_bytes!("../../../test-data/keys/rsa-2048-pub.pem");
    const EC_PEM: &[u8] = include_bytes!("../../../test-data/keys/ec-p256.pem");
    const DSA_PEM: &[u8] = include_bytes!("../../../test-data/keys/dsa-2048.pem");
    const DSA_PUB: &[u8] = include_bytes!("../../../test-data/keys/dsa-2048-pub.pem");
    const HMAC_KEY: &[u8] = include_bytes!("../../../test-data/keys/hmac.bin");

    const DOC: &str = r#"<invoice xmlns:p="urn:example:party"><p:buyer Id="buyer">Alice</p:buyer><total currency="EUR">10.00</total></invoice>"#;

    fn pem_key(pem: &[u8]) -> Key {
        sigill_keys::load_from_memory(pem, KeyDataFormat::Pem).unwrap()
    }

    fn hmac_key() -> Key {
        sigill_keys::load_from_memory(HMAC_KEY, KeyDataFormat::Binary).unwrap()
    }

    /// Enveloped exclusive C14N signature over `URI=""`.
    fn sign_enveloped(method: TransformId, key: Key) -> Document {
        let mut doc = Document::parse(DOC).unwrap();
        let sig =
            template::create_signature(&mut doc, TransformId::ExcC14n, method, Some("sig")).unwrap();
        let reference =
            template::add_reference(&mut doc, sig, TransformId::Sha256, None, None, None).unwrap();
        template::add_transform(&mut doc, reference, TransformId::Enveloped).unwrap();
        template::add_transform(&mut doc, reference, TransformId::ExcC14n).unwrap();
        DsigContext::with_key(key).sign_document(&mut doc).unwrap();
        doc
    }

    fn verify_with(doc: &Document, key: Key) -> (Result<()>, DsigStatus) {
        let mut ctx = DsigContext::with_key(key);
        let result = ctx.verify_document(doc);
        (result, ctx.status())
    }

    fn text_of(doc: &Document, local: &str) -> String {
        let node = doc
            .find_element_from(doc.root(), local, ns::DSIG)
            .unwrap();
        doc.text_content(node)
    }

    fn replace_text(doc: &mut Document, local: &str, text: &str) {
        let node = doc
            .find_element_from(doc.root(), local, ns::DSIG)
            .unwrap();
        doc.set_text(node, text).unwrap();
    }

    #[test]
    fn every_algorithm_family_round_trips() {
        let cases = [
            (TransformId::RsaSha256, pem_key(RSA_PEM), pem_key(RSA_PUB)),
            (TransformId::RsaPssSha256, pem_key(RSA_PEM), pem_key(RSA_PUB)),
            (TransformId::EcdsaSha256, pem_key(EC_PEM), pem_key(EC_PEM)),
            (TransformId::DsaSha256, pem_key(DSA_PEM), pem_key(DSA_PUB)),
            (TransformId::HmacSha256, hmac_key(), hmac_key()),
        ];
        for (method, signer, verifier) in cases {
            let doc = sign_enveloped(method, signer);
            let (result, status) = verify_with(&doc, verifier);
            assert!(result.is_ok(), "{method}: {result:?}");
            assert_eq!(status, DsigStatus::Succeeded, "{method}");
        }
    }

    #[test]
    fn survives_serialization() {
        let doc = sign_enveloped(TransformId::RsaSha256, pem_key(RSA_PEM));
        let xml = doc.to_xml();
        assert!(xml.starts_with(r#"<invoice xmlns:p="urn:example:party"><p:buyer"#));
        assert!(xml.contains(r#"<Reference URI=""><Transforms><Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/><Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/></Transforms>"#));

        let reparsed = Document::parse(&xml).unwrap();
        let mut ctx = DsigContext::with_key(pem_key(RSA_PUB));
        ctx.store_pre_digest = true;
        ctx.verify_document(&reparsed).unwrap();
        // Exclusive C14N moves the prefix declaration to where it is used.
        assert_eq!(
            ctx.references()[0].pre_digest.as_deref(),
            Some(&br#"<invoice><p:buyer xmlns:p="urn:example:party" Id="buyer">Alice</p:buyer><total currency="EUR">10.00</total></invoice>"#[..])
        );
    }

    #[test]
    fn tampered_body_is_invalid() {
        let mut doc = sign_enveloped(TransformId::RsaSha256, pem_key(RSA_PEM));
        let total = doc
            .find_element_from(doc.root(), "total", "")
            .unwrap();
        doc.set_text(total, "1000.00").unwrap();

        let mut ctx = DsigContext::with_key(pem_key(RSA_PUB));
        let err = ctx.verify_document(&doc).unwrap_err();
        assert!(err.is_verification_failure());
        assert_eq!(ctx.status(), DsigStatus::FailedInvalid);
        assert_eq!(ctx.references()[0].status, DsigStatus::FailedInvalid);
    }

    #[test]
    fn tampered_signature_value_is_invalid() {
        let mut doc = sign_enveloped(TransformId::HmacSha256, hmac_key());
        let value = text_of(&doc, ns::node::SIGNATURE_VALUE);
        let flipped = if value.starts_with('A') { "B" } else { "A" };
        replace_text(&mut doc, ns::node::SIGNATURE_VALUE, &format!("{flipped}{}", &value[1..]));
        let (result, status) = verify_with(&doc, hmac_key());
        assert!(matches!(result, Err(Error::Verification(_))));
        assert_eq!(status, DsigStatus::FailedInvalid);

        replace_text(&mut doc, ns::node::SIGNATURE_VALUE, "");
        let (result, status) = verify_with(&doc, hmac_key());
        assert!(result.is_err());
        assert_eq!(status, DsigStatus::FailedInvalid);

        replace_text(&mut doc, ns::node::SIGNATURE_VALUE, "%%%");
        let (_, status) = verify_with(&doc, hmac_key());
        assert_eq!(status, DsigStatus::FailedStructure);
    }

    #[test]
    fn wrong_key_is_invalid() {
        let doc = sign_enveloped(TransformId::RsaSha256, pem_key(RSA_PEM));
        let (result, status) = verify_with(&doc, pem_key(EC_PEM));
        assert!(result.is_err());
        assert_eq!(status, DsigStatus::FailedInvalid);
    }

    #[test]
    fn zero_references_is_a_structure_failure() {
        let mut doc = Document::parse(DOC).unwrap();
        template::create_signature(&mut doc, TransformId::C14n, TransformId::HmacSha1, None)
            .unwrap();
        let (result, status) = verify_with(&doc, hmac_key());
        assert!(matches!(result, Err(Error::Verification(_))));
        assert_eq!(status, DsigStatus::FailedStructure);
    }

    #[test]
    fn missing_signature_is_not_found() {
        let doc = Document::parse(DOC).unwrap();
        let mut ctx = DsigContext::with_key(hmac_key());
        let err = ctx.verify_document(&doc).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
        assert!(err.is_verification_failure());
        assert_eq!(ctx.status(), DsigStatus::NotRun);
    }

    #[test]
    fn failed_lookup_clears_the_previous_result() {
        let doc = sign_enveloped(TransformId::HmacSha256, hmac_key());
        let mut ctx = DsigContext::with_key(hmac_key());
        ctx.verify_document(&doc).unwrap();
        assert_eq!(ctx.status(), DsigStatus::Succeeded);
        assert_eq!(ctx.references().len(), 1);

        let unsigned = Document::parse("<doc>y</doc>").unwrap();
        let err = ctx.verify_document(&unsigned).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
        assert_eq!(ctx.status(), DsigStatus::NotRun);
        assert!(ctx.references().is_empty());

        ctx.verify_document(&doc).unwrap();
        let empty = Document::new();
        assert!(matches!(
            ctx.verify_document(&empty),
            Err(Error::InvalidDocument(_))
        ));
        assert_eq!(ctx.status(), DsigStatus::NotRun);
        assert!(ctx.references().is_empty());
    }

    #[test]
    fn id_reference_and_duplicate_ids() {
        let mut doc = Document::parse(DOC).unwrap();
        let sig = template::create_signature_with_prefix(
            &mut doc,
            TransformId::ExcC14n,
            TransformId::HmacSha256,
            None,
            Some("ds"),
        )
        .unwrap();
        template::add_reference(&mut doc, sig, TransformId::Sha1, None, Some("#buyer"), None)
            .unwrap();
        let mut ctx = DsigContext::with_key(hmac_key());
        ctx.sign_node(&mut doc, sig).unwrap();
        ctx.verify_node(&doc, sig).unwrap();

        let mut xml = doc.to_xml();
        xml = xml.replace("<total ", r#"<total Id="buyer" "#);
        let forged = Document::parse(&xml).unwrap();
        let (result, status) = verify_with(&forged, hmac_key());
        assert!(result.is_err());
        assert_eq!(status, DsigStatus::FailedStructure);
    }

    #[test]
    fn truncated_hmac_needs_an_acceptable_length() {
        let mut doc = Document::parse(DOC).unwrap();
        let sig =
            template::create_signature(&mut doc, TransformId::C14n, TransformId::HmacSha256, None)
                .unwrap();
        template::add_reference(&mut doc, sig, TransformId::Sha256, None, Some("#buyer"), None)
            .unwrap();
        template::add_hmac_output_length(&mut doc, sig, 128).unwrap();
        DsigContext::with_key(hmac_key())
            .sign_node(&mut doc, sig)
            .unwrap();
        assert_eq!(
            decode_base64(
                &doc,
                doc.find_element_from(doc.root(), ns::node::SIGNATURE_VALUE, ns::DSIG)
                    .unwrap(),
                "SignatureValue"
            )
            .unwrap()
            .len(),
            16
        );
        let (result, _) = verify_with(&doc, hmac_key());
        assert!(result.is_ok(), "{result:?}");

        replace_text(&mut doc, ns::node::HMAC_OUTPUT_LENGTH, "40");
        let (result, status) = verify_with(&doc, hmac_key());
        assert!(result.is_err());
        assert_eq!(status, DsigStatus::FailedInvalid);

        let mut ctx = DsigContext::with_key(hmac_key());
        ctx.hmac_min_out_len = 160;
        replace_text(&mut doc, ns::node::HMAC_OUTPUT_LENGTH, "128");
        assert!(ctx.verify_node(&doc, sig).is_err());
    }

    #[test]
    fn memory_and_file_keys_sign_identically() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsa-2048.pem");
        let from_file = sigill_keys::load_from_file(path, KeyDataFormat::Pem).unwrap();
        let a = sign_enveloped(TransformId::RsaSha256, pem_key(RSA_PEM));
        let b = sign_enveloped(TransformId::RsaSha256, from_file);
        assert_eq!(
            text_of(&a, ns::node::SIGNATURE_VALUE),
            text_of(&b, ns::node::SIGNATURE_VALUE)
        );
    }

    #[test]
    fn destroyed_context_is_refused_before_verifying() {
        let doc = sign_enveloped(TransformId::HmacSha256, hmac_key());
        let mut ctx = DsigContext::with_key(hmac_key());
        ctx.verify_document(&doc).unwrap();
        ctx.destroy().unwrap();
        assert!(matches!(ctx.verify_document(&doc), Err(Error::InvalidContext)));
        let sig = locate_signature(&doc).unwrap();
        assert!(matches!(
            ctx.verify_node(&doc, doc.handle(sig)),
            Err(Error::InvalidContext)
        ));
        let mut copy = doc.clone();
        assert!(matches!(ctx.sign_document(&mut copy), Err(Error::InvalidContext)));
        assert!(matches!(ctx.destroy(), Err(Error::InvalidContext)));
    }

    #[test]
    fn file_references_follow_the_security_policy() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/hmac.bin");
        let mut doc = Document::parse("<doc/>").unwrap();
        let sig =
            template::create_signature(&mut doc, TransformId::C14n, TransformId::HmacSha256, None)
                .unwrap();
        template::add_reference(
            &mut doc,
            sig,
            TransformId::Sha256,
            None,
            Some(&format!("file://{path}")),
            None,
        )
        .unwrap();

        // No policy is installed in this crate's tests, so the locked-down
        // default applies.
        assert!(!policy::is_installed());
        let mut ctx = DsigContext::with_key(Key::new(KeyData::Hmac(b"k".to_vec())));
        match ctx.sign_node(&mut doc, sig) {
            Err(Error::Sign(inner)) => assert!(matches!(*inner, Error::PolicyDenied(_))),
            other => panic!("unexpected {other:?}"),
        }
    }
}
