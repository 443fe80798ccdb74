#![forbid(unsafe_code)]

//! XPath filtering transform.
//!
//! Only the expression XML-DSig signers actually emit is supported:
//! `not(ancestor-or-self::PREFIX:Signature)`, with `PREFIX` bound to the
//! XML-DSig namespace on the `<XPath>` element. It drops every signature
//! in the document from the node set. Any other expression is rejected
//! when the transform is built.

use crate::pipeline::{Transform, TransformData};
use sigill_core::{ns, Error, Result, TransformId};
use sigill_xml::{Document, NodeId, NodeSet};

pub struct XPathFilterTransform {
    expression: String,
}

impl XPathFilterTransform {
    /// Build from an `<XPath>` element.
    pub fn from_node(doc: &Document, xpath: NodeId) -> Result<Self> {
        let expression = doc.text_content(xpath).trim().to_owned();
        let prefix = expression
            .strip_prefix("not(ancestor-or-self::")
            .and_then(|rest| rest.strip_suffix(":Signature)"))
            .ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("XPath expression: {expression}"))
            })?;
        let bound = doc.in_scope_namespaces(xpath);
        if bound.get(prefix).map(String::as_str) != Some(ns::DSIG) {
            return Err(Error::UnsupportedAlgorithm(format!(
                "XPath prefix {prefix:?} is not bound to the XML-DSig namespace"
            )));
        }
        Ok(Self { expression })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl Transform for XPathFilterTransform {
    fn id(&self) -> TransformId {
        TransformId::XPath
    }

    fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>> {
        let TransformData::Xml { doc, node_set } = input else {
            return Err(Error::Transform("XPath transform requires XML input".into()));
        };
        let mut set = node_set.unwrap_or_else(|| NodeSet::all(&doc));
        let mut signatures = Vec::new();
        for id in doc.descendants(doc.root()) {
            if doc
                .element(id)
                .is_some_and(|e| e.name.matches(ns::DSIG, ns::node::SIGNATURE))
            {
                signatures.push(id);
            }
        }
        for signature in signatures {
            set.remove_subtree(&doc, signature);
        }
        Ok(TransformData::Xml {
            doc,
            node_set: Some(set),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r#"<r><a>x</a><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:Transforms><ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116"><ds:XPath>not(ancestor-or-self::ds:Signature)</ds:XPath></ds:Transform></ds:Transforms></ds:Signature></r>"#;

    fn xpath_node(doc: &Document) -> NodeId {
        doc.find_element_from(doc.root(), ns::node::XPATH, ns::DSIG)
            .unwrap()
    }

    #[test]
    fn enveloped_expression_filters_signatures() {
        let doc = Document::parse(SIGNED).unwrap();
        let t = XPathFilterTransform::from_node(&doc, xpath_node(&doc)).unwrap();
        assert_eq!(t.expression(), "not(ancestor-or-self::ds:Signature)");
        let out = t.execute(TransformData::xml(&doc, None)).unwrap();
        assert_eq!(out.to_binary().unwrap(), b"<r><a>x</a></r>");
    }

    #[test]
    fn other_expressions_are_unsupported() {
        let doc = Document::parse(&SIGNED.replace("not(ancestor-or-self::ds:Signature)", "//a"))
            .unwrap();
        assert!(matches!(
            XPathFilterTransform::from_node(&doc, xpath_node(&doc)),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn prefix_must_be_bound_to_dsig() {
        let doc = Document::parse(
            &SIGNED.replace("ancestor-or-self::ds:", "ancestor-or-self::other:"),
        )
        .unwrap();
        assert!(matches!(
            XPathFilterTransform::from_node(&doc, xpath_node(&doc)),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
