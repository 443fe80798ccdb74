#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - outputs namespace declarations sorted by prefix (default first)
//! - outputs attributes sorted by (namespace-URI, local-name)
//! - escapes text and attribute values
//! - keeps or strips comments
//! - supports document-subset canonicalization via [`NodeSet`]

use crate::escape;
use crate::render::{self, Attr, NsDecl};
use sigill_core::{ns, Result};
use sigill_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::BTreeMap;

/// Canonicalize a document (or the subset selected by `node_set`).
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>> {
    run(doc, with_comments, node_set, inherit_xml_attr_10)
}

/// C14N 1.0 inherits every `xml:*` attribute into an orphaned subset root.
fn inherit_xml_attr_10(_local_name: &str) -> bool {
    true
}

pub(crate) fn run(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inherit_xml_attr: fn(&str) -> bool,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        doc,
        with_comments,
        node_set,
        inherit_xml_attr,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct C14nContext<'a> {
    doc: &'a Document,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inherit_xml_attr: fn(&str) -> bool,
}

impl C14nContext<'_> {
    fn is_visible(&self, id: NodeId) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(id))
    }

    /// `rendered_ns` is the in-scope namespace set of the nearest visible
    /// ancestor element.
    fn process_node(&self, id: NodeId, output: &mut Vec<u8>, rendered_ns: &BTreeMap<String, String>) {
        match self.doc.node_kind(id) {
            Some(NodeKind::Document) => {
                for &child in self.doc.children(id) {
                    self.process_node(child, output, rendered_ns);
                }
            }
            Some(NodeKind::Element(_)) => self.process_element(id, output, rendered_ns),
            Some(NodeKind::Text(text)) => {
                if self.is_visible(id) {
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            Some(NodeKind::Comment(_)) => {
                if self.with_comments && self.is_visible(id) {
                    render::write_misc(self.doc, id, output);
                }
            }
            Some(NodeKind::ProcessingInstruction(_)) => {
                if self.is_visible(id) {
                    render::write_misc(self.doc, id, output);
                }
            }
            None => {}
        }
    }

    fn process_element(&self, id: NodeId, output: &mut Vec<u8>, rendered_ns: &BTreeMap<String, String>) {
        let Some(element) = self.doc.element(id) else {
            return;
        };

        if !self.is_visible(id) {
            // Invisible elements contribute nothing; visible descendants
            // still compare against the nearest visible ancestor.
            for &child in self.doc.children(id) {
                self.process_node(child, output, rendered_ns);
            }
            return;
        }

        let in_scope = self.doc.in_scope_namespaces(id);

        let mut ns_decls: Vec<NsDecl> = in_scope
            .iter()
            .filter(|(prefix, uri)| rendered_ns.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl::new(prefix, uri))
            .collect();
        // Default namespace dropped relative to the nearest visible ancestor.
        if rendered_ns.get("").is_some_and(|u| !u.is_empty()) && !in_scope.contains_key("") {
            ns_decls.push(NsDecl::new("", ""));
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = element.attributes.iter().map(Attr::from_attribute).collect();
        if self.node_set.is_some() {
            let parent_visible = self
                .doc
                .parent(id)
                .is_some_and(|p| self.doc.is_element(p) && self.is_visible(p));
            if !parent_visible {
                let inherited = self.inherited_xml_attrs(id, &attrs);
                attrs.extend(inherited);
            }
        }
        attrs.sort();

        let name = element.name.qualified();
        render::write_start_tag(output, &name, &ns_decls, &attrs);
        for &child in self.doc.children(id) {
            self.process_node(child, output, &in_scope);
        }
        render::write_end_tag(output, &name);
    }

    /// `xml:*` attributes of ancestors (nearest wins) that an orphaned
    /// subset root must carry, minus the ones it already has.
    fn inherited_xml_attrs(&self, id: NodeId, existing: &[Attr]) -> Vec<Attr> {
        let mut inherited: BTreeMap<&str, &str> = BTreeMap::new();
        let mut current = self.doc.parent(id);
        while let Some(ancestor) = current {
            if let Some(element) = self.doc.element(ancestor) {
                for attr in &element.attributes {
                    if attr.name.namespace_uri.as_deref() == Some(ns::XML)
                        && (self.inherit_xml_attr)(&attr.name.local_name)
                    {
                        inherited
                            .entry(attr.name.local_name.as_str())
                            .or_insert(attr.value.as_str());
                    }
                }
            }
            current = self.doc.parent(ancestor);
        }

        inherited
            .into_iter()
            .filter(|(name, _)| {
                !existing
                    .iter()
                    .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
            })
            .map(|(name, value)| Attr {
                ns_uri: ns::XML.to_owned(),
                local_name: name.to_owned(),
                qualified_name: format!("xml:{name}"),
                value: value.to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap()
    }

    #[test]
    fn sorts_attributes_and_expands_empty_elements() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn renders_namespaces_once() {
        assert_eq!(
            c14n(r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child xmlns:a="http://a"/></root>"#),
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn escapes_text() {
        assert_eq!(
            c14n("<root>a &amp; b &lt; c &gt; d</root>"),
            "<root>a &amp; b &lt; c &gt; d</root>"
        );
    }

    #[test]
    fn comments_and_pis_at_top_level() {
        let xml = "<?pi x?><!--before--><doc><!--in--></doc><!--after-->";
        let doc = Document::parse(xml).unwrap();
        let without = String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap();
        assert_eq!(without, "<?pi x?>\n<doc></doc>");
        let with = String::from_utf8(canonicalize(&doc, true, None).unwrap()).unwrap();
        assert_eq!(
            with,
            "<?pi x?>\n<!--before-->\n<doc><!--in--></doc>\n<!--after-->"
        );
    }

    #[test]
    fn subset_carries_inherited_context() {
        let xml = r#"<a xmlns="urn:a" xmlns:p="urn:p" xml:lang="en"><b p:k="v">t</b></a>"#;
        let doc = Document::parse(xml).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.find_element_from(a, "b", "urn:a").unwrap();
        let subset = NodeSet::tree_without_comments(&doc, b);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&subset)).unwrap()).unwrap();
        assert_eq!(
            out,
            r#"<b xmlns="urn:a" xmlns:p="urn:p" xml:lang="en" p:k="v">t</b>"#
        );
    }

    #[test]
    fn attribute_keeps_its_written_prefix() {
        assert_eq!(
            c14n(r#"<a xmlns:p="urn:p" xmlns:q="urn:p"><b q:x="1"/></a>"#),
            r#"<a xmlns:p="urn:p" xmlns:q="urn:p"><b q:x="1"></b></a>"#
        );
    }

    #[test]
    fn default_namespace_undeclaration() {
        assert_eq!(
            c14n(r#"<a xmlns="urn:a"><b xmlns=""><c/></b></a>"#),
            r#"<a xmlns="urn:a"><b xmlns=""><c></c></b></a>"#
        );
    }
}
