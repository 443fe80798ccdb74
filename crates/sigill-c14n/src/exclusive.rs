#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A prefix is
//! visibly utilized by an element if:
//! 1. the element's tag name uses it, or
//! 2. one of the element's attributes uses it, or
//! 3. it appears in the InclusiveNamespaces PrefixList (`#default` being
//!    the default namespace).

use crate::escape;
use crate::render::{self, Attr, NsDecl};
use sigill_core::Result;
use sigill_xml::{Document, NodeId, NodeKind, NodeSet};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &Document,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    let inclusive_prefixes = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let ctx = ExcC14nContext {
        doc,
        with_comments,
        node_set,
        inclusive_prefixes,
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct ExcC14nContext<'a> {
    doc: &'a Document,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, id: NodeId) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(id))
    }

    /// `rendered_ns` holds the bindings already output by visible ancestors.
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
            for &child in self.doc.children(id) {
                self.process_node(child, output, rendered_ns);
            }
            return;
        }

        let mut utilized: BTreeSet<String> = self.inclusive_prefixes.clone();
        utilized.insert(element.name.prefix.clone().unwrap_or_default());
        for attr in &element.attributes {
            if let Some(prefix) = &attr.name.prefix {
                if attr.name.namespace_uri.is_some() {
                    utilized.insert(prefix.clone());
                }
            }
        }
        utilized.remove("xml");

        let in_scope = self.doc.in_scope_namespaces(id);
        let mut ns_decls = Vec::new();
        for prefix in &utilized {
            match in_scope.get(prefix) {
                Some(uri) => {
                    if rendered_ns.get(prefix) != Some(uri) {
                        ns_decls.push(NsDecl::new(prefix, uri));
                    }
                }
                None if prefix.is_empty() => {
                    // Element in no namespace below a rendered default.
                    if rendered_ns.get("").is_some_and(|u| !u.is_empty()) {
                        ns_decls.push(NsDecl::new("", ""));
                    }
                }
                None => {}
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = element.attributes.iter().map(Attr::from_attribute).collect();
        attrs.sort();

        let name = element.name.qualified();
        render::write_start_tag(output, &name, &ns_decls, &attrs);

        let mut child_rendered = rendered_ns.clone();
        for decl in &ns_decls {
            child_rendered.insert(decl.prefix.clone(), decl.uri.clone());
        }
        for &child in self.doc.children(id) {
            self.process_node(child, output, &child_rendered);
        }
        render::write_end_tag(output, &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subset_c14n(xml: &str, local: &str, ns_uri: &str, prefixes: &[&str]) -> String {
        let doc = Document::parse(xml).unwrap();
        let root = doc.document_element().unwrap();
        let target = doc.find_element_from(root, local, ns_uri).unwrap();
        let subset = NodeSet::tree_without_comments(&doc, target);
        let prefixes: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, Some(&subset), &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn drops_unused_namespaces() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x><y/></a:x></r>"#;
        assert_eq!(
            subset_c14n(xml, "x", "urn:a", &[]),
            r#"<a:x xmlns:a="urn:a"><y></y></a:x>"#
        );
    }

    #[test]
    fn inclusive_prefix_list_forces_output() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x><y/></a:x></r>"#;
        assert_eq!(
            subset_c14n(xml, "x", "urn:a", &["b"]),
            r#"<a:x xmlns:a="urn:a" xmlns:b="urn:b"><y></y></a:x>"#
        );
    }

    #[test]
    fn attribute_prefixes_are_utilized() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:q"><x p:k="1"><z q:k="2"/></x></r>"#;
        assert_eq!(
            subset_c14n(xml, "x", "", &[]),
            r#"<x xmlns:p="urn:p" p:k="1"><z xmlns:q="urn:q" q:k="2"></z></x>"#
        );
    }

    #[test]
    fn shared_uri_prefixes_stay_distinct() {
        let xml = r#"<r xmlns:p="urn:p" xmlns:q="urn:p"><x q:k="1"/></r>"#;
        assert_eq!(
            subset_c14n(xml, "x", "", &[]),
            r#"<x xmlns:q="urn:p" q:k="1"></x>"#
        );
    }

    #[test]
    fn default_namespace() {
        let xml = r#"<r xmlns="urn:d"><x><y xmlns=""/></x></r>"#;
        assert_eq!(
            subset_c14n(xml, "x", "urn:d", &[]),
            r#"<x xmlns="urn:d"><y xmlns=""></y></x>"#
        );
    }

    #[test]
    fn whole_document() {
        let doc = Document::parse(r#"<r xmlns:u="urn:u"><!--c--><e/></r>"#).unwrap();
        let out = String::from_utf8(canonicalize(&doc, true, None, &[]).unwrap()).unwrap();
        assert_eq!(out, "<r><!--c--><e></e></r>");
    }
}
