#![forbid(unsafe_code)]

//! XML serialization.
//!
//! [`XmlWriter`] is a small string builder for well-formed XML; the
//! `Document::to_xml*` methods drive it over the arena tree. Output is not
//! canonical: namespace declarations and attributes are written in stored
//! order and no whitespace is added.

use crate::document::{Document, NodeId, NodeKind};

/// A simple XML writer.
#[derive(Debug, Default)]
pub struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the XML declaration.
    pub fn write_declaration(&mut self) {
        self.buf
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    /// Write `<name attr="v" ...` without closing the start tag.
    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.buf.push('<');
        self.buf.push_str(name);
        for (k, v) in attrs {
            self.buf.push(' ');
            self.buf.push_str(k);
            self.buf.push_str("=\"");
            escape_attr_into(&mut self.buf, v);
            self.buf.push('"');
        }
    }

    /// Start an element with the given qualified name and attributes.
    pub fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.open(name, attrs);
        self.buf.push('>');
    }

    /// Write an empty element (self-closing).
    pub fn empty_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.open(name, attrs);
        self.buf.push_str("/>");
    }

    pub fn end_element(&mut self, name: &str) {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
    }

    pub fn write_text(&mut self, text: &str) {
        escape_text_into(&mut self.buf, text);
    }

    pub fn write_comment(&mut self, text: &str) {
        self.buf.push_str("<!--");
        self.buf.push_str(text);
        self.buf.push_str("-->");
    }

    pub fn write_pi(&mut self, target: &str, data: Option<&str>) {
        self.buf.push_str("<?");
        self.buf.push_str(target);
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            self.buf.push(' ');
            self.buf.push_str(data);
        }
        self.buf.push_str("?>");
    }

    pub fn write_raw(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

fn escape_text_into(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

impl Document {
    /// Serialize the whole document without an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        write_node(self, self.root(), &mut w);
        w.into_string()
    }

    /// Serialize the whole document with an XML declaration.
    pub fn to_xml_with_declaration(&self) -> String {
        let mut w = XmlWriter::new();
        w.write_declaration();
        write_node(self, self.root(), &mut w);
        w.into_string()
    }

    /// Serialize one node and its subtree.
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut w = XmlWriter::new();
        write_node(self, id, &mut w);
        w.into_string()
    }
}

fn write_node(doc: &Document, id: NodeId, w: &mut XmlWriter) {
    match doc.node_kind(id) {
        Some(NodeKind::Document) => {
            for (i, &child) in doc.children(id).iter().enumerate() {
                if i > 0 {
                    w.write_raw("\n");
                }
                write_node(doc, child, w);
            }
        }
        Some(NodeKind::Element(e)) => {
            let name = e.name.qualified();
            let mut attrs: Vec<(String, &str)> = e
                .namespace_declarations
                .iter()
                .map(|(prefix, uri)| {
                    let key = if prefix.is_empty() {
                        "xmlns".to_owned()
                    } else {
                        format!("xmlns:{prefix}")
                    };
                    (key, uri.as_str())
                })
                .collect();
            attrs.extend(e.attributes.iter().map(|a| (a.name.qualified(), a.value.as_str())));
            let attrs: Vec<(&str, &str)> = attrs.iter().map(|(k, v)| (k.as_str(), *v)).collect();

            let children = doc.children(id);
            if children.is_empty() {
                w.empty_element(&name, &attrs);
            } else {
                w.start_element(&name, &attrs);
                for &child in children {
                    write_node(doc, child, w);
                }
                w.end_element(&name);
            }
        }
        Some(NodeKind::Text(t)) => w.write_text(t),
        Some(NodeKind::Comment(c)) => w.write_comment(c),
        Some(NodeKind::ProcessingInstruction(pi)) => w.write_pi(&pi.target, pi.data.as_deref()),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::QName;

    #[test]
    fn attribute_prefix_survives_round_trip() {
        let doc = Document::parse(r#"<a xmlns:p="urn:p" xmlns:q="urn:p"><b q:x="1" p:y="2"/></a>"#)
            .unwrap();
        let out = doc.to_xml();
        assert!(out.contains(r#"<b q:x="1" p:y="2"/>"#), "{out}");
    }

    #[test]
    fn serializes_parsed_document() {
        let xml = r#"<?pi data?><a xmlns="urn:a" xmlns:p="urn:p" p:x="1&amp;2"><b>t &lt; u</b><!--c--><e/></a>"#;
        let doc = Document::parse(xml).unwrap();
        let out = doc.to_xml();
        assert!(out.starts_with("<?pi data?>\n<a "));
        assert!(out.contains(r#"xmlns="urn:a""#));
        assert!(out.contains(r#"xmlns:p="urn:p""#));
        assert!(out.contains(r#"p:x="1&amp;2""#));
        assert!(out.contains("<b>t &lt; u</b><!--c--><e/></a>"));
        let again = Document::parse(&out).unwrap();
        let a = again.document_element().unwrap();
        assert_eq!(again.text_content(a), "t < u");
    }

    #[test]
    fn writer_escapes_attribute_whitespace() {
        let mut w = XmlWriter::new();
        w.empty_element("x", &[("v", "a\"b\nc")]);
        assert_eq!(w.into_string(), r#"<x v="a&quot;b&#xA;c"/>"#);
    }

    #[test]
    fn serializes_created_elements() {
        let mut doc = Document::new();
        let root = doc
            .append_element(doc.root(), QName::new(Some("ds"), "Signature", "urn:ds"))
            .unwrap();
        doc.declare_namespace(root, "ds", "urn:ds").unwrap();
        doc.set_attribute(root, "Id", "sig").unwrap();
        doc.set_text(root, "x").unwrap();
        assert_eq!(
            doc.to_xml_with_declaration(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ds:Signature xmlns:ds=\"urn:ds\" Id=\"sig\">x</ds:Signature>"
        );
    }
}
