#![forbid(unsafe_code)]

//! Mutable arena-backed XML document.
//!
//! Text is parsed with `roxmltree` and copied into an arena of nodes that
//! can be extended in place (signature templates are injected into the
//! caller's document) and serialized back out.
//!
//! Two kinds of node reference exist:
//!
//! - [`NodeId`]: a raw arena index, used internally and by canonicalization.
//! - [`NodeRef`]: a caller-facing handle carrying the owning document's id
//!   and the node's generation. [`Document::resolve`] rejects handles that
//!   belong to another document or point at a detached node.

use crate::parsing_options;
use sigill_core::{ns, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a node inside a [`Document`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A validated-on-use handle to a node of a specific document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    document: u64,
    id: NodeId,
    generation: u32,
}

impl NodeRef {
    /// The arena index this handle points at. Only meaningful together
    /// with the document it came from.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
}

impl QName {
    /// A name in no namespace.
    pub fn local(local_name: &str) -> Self {
        Self {
            prefix: None,
            local_name: local_name.to_owned(),
            namespace_uri: None,
        }
    }

    /// A name in `namespace_uri`, written with `prefix` (or unprefixed).
    pub fn new(prefix: Option<&str>, local_name: &str, namespace_uri: &str) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_owned),
            local_name: local_name.to_owned(),
            namespace_uri: Some(namespace_uri.to_owned()),
        }
    }

    /// `prefix:local` or `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Compare by expanded name. An empty `namespace_uri` means "no namespace".
    pub fn matches(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.local_name == local_name
            && self.namespace_uri.as_deref().unwrap_or("") == namespace_uri
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    /// Namespaces declared on this element as `(prefix, uri)`; the default
    /// namespace uses an empty prefix and `("", "")` is `xmlns=""`.
    pub namespace_declarations: Vec<(String, String)>,
}

impl Element {
    fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespace_declarations: Vec::new(),
        }
    }

    /// Value of an attribute in no namespace.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace_uri.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespaced attribute.
    pub fn attribute_ns(&self, namespace_uri: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.matches(namespace_uri, local_name) && a.name.namespace_uri.is_some())
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
}

/// An owned, mutable XML document.
#[derive(Debug)]
pub struct Document {
    id: u64,
    nodes: Vec<NodeData>,
}

impl Document {
    /// An empty document (just the document node).
    pub fn new() -> Self {
        Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                generation: 0,
            }],
        }
    }

    /// Parse XML text.
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = roxmltree::Document::parse_with_options(text, parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        let mut doc = Self::new();
        let root = doc.root();
        let source = parsed.input_text();
        for child in parsed.root().children() {
            doc.import(source, child, root);
        }
        Ok(doc)
    }

    /// Parse XML from UTF-8 bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?;
        Self::parse(text)
    }

    fn import(&mut self, source: &str, node: roxmltree::Node<'_, '_>, parent: NodeId) {
        let kind = match node.node_type() {
            roxmltree::NodeType::Root => return,
            roxmltree::NodeType::Element => NodeKind::Element(element_from_parsed(source, node)),
            roxmltree::NodeType::Text => NodeKind::Text(node.text().unwrap_or("").to_owned()),
            roxmltree::NodeType::Comment => {
                NodeKind::Comment(node.text().unwrap_or("").to_owned())
            }
            roxmltree::NodeType::PI => match node.pi() {
                Some(pi) => NodeKind::ProcessingInstruction(ProcessingInstruction {
                    target: pi.target.to_owned(),
                    data: pi.value.map(str::to_owned),
                }),
                None => return,
            },
        };
        let id = self.push(parent, kind, None);
        for child in node.children() {
            self.import(source, child, id);
        }
    }

    // ── Identity and handles ─────────────────────────────────────────

    /// Process-unique id of this document.
    pub fn document_id(&self) -> u64 {
        self.id
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Make a handle for a node of this document.
    pub fn handle(&self, id: NodeId) -> NodeRef {
        let generation = self.nodes.get(id.0).map_or(0, |n| n.generation);
        NodeRef {
            document: self.id,
            id,
            generation,
        }
    }

    /// Validate a handle against this document.
    pub fn resolve(&self, node: NodeRef) -> Result<NodeId> {
        if node.document != self.id {
            return Err(Error::InvalidNode(format!(
                "handle belongs to document {}, not {}",
                node.document, self.id
            )));
        }
        match self.nodes.get(node.id.0) {
            None => Err(Error::InvalidNode(format!("no node at index {}", node.id.0))),
            Some(data) if data.generation != node.generation => Err(Error::InvalidNode(
                format!("node {} was detached from the document", node.id.0),
            )),
            Some(_) => Ok(node.id),
        }
    }

    /// Handle to the document element.
    pub fn document_element_ref(&self) -> Result<NodeRef> {
        self.document_element()
            .map(|id| self.handle(id))
            .ok_or_else(|| Error::InvalidDocument("document has no root element".into()))
    }

    // ── Read access ──────────────────────────────────────────────────

    pub fn node_kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node_kind(id) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(e)) => Ok(e),
            _ => Err(Error::InvalidNode(format!("node {} is not an element", id.0))),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// All descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text(t)) = self.node_kind(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let Some(NodeKind::Text(t)) = self.node_kind(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Element children of `id`.
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// First element child with the given expanded name.
    pub fn find_child_element(
        &self,
        id: NodeId,
        namespace_uri: &str,
        local_name: &str,
    ) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| {
            self.element(c)
                .is_some_and(|e| e.name.matches(namespace_uri, local_name))
        })
    }

    /// All element children with the given expanded name.
    pub fn find_child_elements(
        &self,
        id: NodeId,
        namespace_uri: &str,
        local_name: &str,
    ) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| {
                self.element(c)
                    .is_some_and(|e| e.name.matches(namespace_uri, local_name))
            })
            .collect()
    }

    /// Depth-first, pre-order search of the subtree rooted at `root`
    /// (including `root`) for the first element with the given name.
    ///
    /// `Ok(None)` means no such element. A stale `root` is an error.
    pub fn find_element(
        &self,
        root: NodeRef,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<Option<NodeRef>> {
        let root = self.resolve(root)?;
        Ok(self
            .find_element_from(root, local_name, namespace_uri)
            .map(|id| self.handle(id)))
    }

    /// [`Document::find_element`] over raw ids.
    pub fn find_element_from(
        &self,
        root: NodeId,
        local_name: &str,
        namespace_uri: &str,
    ) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self
                .element(id)
                .is_some_and(|e| e.name.matches(namespace_uri, local_name))
            {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        None
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// In-scope namespace bindings at `id`, nearest declaration winning.
    /// The `xml` prefix is implicit and not included.
    pub fn in_scope_namespaces(&self, id: NodeId) -> std::collections::BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(n) = current {
            if let Some(e) = self.element(n) {
                chain.push(e);
            }
            current = self.parent(n);
        }
        let mut result = std::collections::BTreeMap::new();
        for e in chain.into_iter().rev() {
            for (prefix, uri) in &e.namespace_declarations {
                if uri.is_empty() {
                    result.remove(prefix);
                } else {
                    result.insert(prefix.clone(), uri.clone());
                }
            }
        }
        result
    }

    // ── Mutation ─────────────────────────────────────────────────────

    fn push(&mut self, parent: NodeId, kind: NodeKind, before: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            generation: 0,
        });
        let siblings = &mut self.nodes[parent.0].children;
        match before.and_then(|b| siblings.iter().position(|&c| c == b)) {
            Some(pos) => siblings.insert(pos, id),
            None => siblings.push(id),
        }
        id
    }

    fn check_container(&self, parent: NodeId) -> Result<()> {
        match self.node_kind(parent) {
            Some(NodeKind::Element(_)) => Ok(()),
            Some(NodeKind::Document) => {
                if self.document_element().is_some() {
                    Err(Error::InvalidDocument(
                        "document already has a root element".into(),
                    ))
                } else {
                    Ok(())
                }
            }
            Some(_) => Err(Error::InvalidNode(format!(
                "node {} cannot have children",
                parent.0
            ))),
            None => Err(Error::InvalidNode(format!("no node at index {}", parent.0))),
        }
    }

    /// Append a new element as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: QName) -> Result<NodeId> {
        self.check_container(parent)?;
        Ok(self.push(parent, NodeKind::Element(Element::new(name)), None))
    }

    /// Insert a new element into `parent` right before its child `before`.
    pub fn insert_element_before(
        &mut self,
        parent: NodeId,
        before: NodeId,
        name: QName,
    ) -> Result<NodeId> {
        self.check_container(parent)?;
        if self.parent(before) != Some(parent) {
            return Err(Error::InvalidNode(format!(
                "node {} is not a child of {}",
                before.0, parent.0
            )));
        }
        Ok(self.push(parent, NodeKind::Element(Element::new(name)), Some(before)))
    }

    /// Append a text node to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        if self.element(parent).is_none() {
            return Err(Error::InvalidNode(format!(
                "node {} is not an element",
                parent.0
            )));
        }
        Ok(self.push(parent, NodeKind::Text(text.to_owned()), None))
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        if self.element(id).is_none() {
            return Err(Error::InvalidNode(format!("node {} is not an element", id.0)));
        }
        for child in self.children(id).to_vec() {
            self.detach(child)?;
        }
        if !text.is_empty() {
            self.append_text(id, text)?;
        }
        Ok(())
    }

    /// Set (or replace) an attribute in no namespace.
    pub fn set_attribute(&mut self, id: NodeId, local_name: &str, value: &str) -> Result<()> {
        let element = self.element_mut(id)?;
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace_uri.is_none() && a.name.local_name == local_name)
        {
            Some(attr) => attr.value = value.to_owned(),
            None => element.attributes.push(Attribute {
                name: QName::local(local_name),
                value: value.to_owned(),
            }),
        }
        Ok(())
    }

    /// Declare a namespace on an element. An empty prefix is the default
    /// namespace.
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) -> Result<()> {
        let element = self.element_mut(id)?;
        match element
            .namespace_declarations
            .iter_mut()
            .find(|(p, _)| p == prefix)
        {
            Some(decl) => decl.1 = uri.to_owned(),
            None => element
                .namespace_declarations
                .push((prefix.to_owned(), uri.to_owned())),
        }
        Ok(())
    }

    /// Remove `id` (and its subtree) from the tree. Existing handles to any
    /// of the removed nodes stop resolving.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .parent(id)
            .ok_or_else(|| Error::InvalidNode(format!("node {} has no parent", id.0)))?;
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let data = &mut self.nodes[n.0];
            data.generation = data.generation.wrapping_add(1);
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Document {
    /// A clone is a distinct document: handles from the original do not
    /// resolve against it.
    fn clone(&self) -> Self {
        Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            nodes: self.nodes.clone(),
        }
    }
}

// ── Conversion from roxmltree ────────────────────────────────────────

fn element_from_parsed(source: &str, node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let name = QName {
        prefix: element_prefix(source, node),
        local_name: tag.name().to_owned(),
        namespace_uri: tag.namespace().map(str::to_owned),
    };
    let attributes = node
        .attributes()
        .map(|a| Attribute {
            name: QName {
                prefix: attribute_prefix(source, node, &a),
                local_name: a.name().to_owned(),
                namespace_uri: a.namespace().map(str::to_owned),
            },
            value: a.value().to_owned(),
        })
        .collect();
    Element {
        name,
        attributes,
        namespace_declarations: declared_namespaces(node),
    }
}

/// The prefix the element was written with. roxmltree only exposes expanded
/// names, so read the start tag from the source and fall back to a lookup
/// when the node did not come from the input text (entity expansion).
fn element_prefix(source: &str, node: roxmltree::Node<'_, '_>) -> Option<String> {
    let local = node.tag_name().name();
    if let Some(tag) = source
        .get(node.range().start..)
        .and_then(|s| s.strip_prefix('<'))
    {
        let end = tag
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(tag.len());
        let qname = &tag[..end];
        match qname.split_once(':') {
            Some((prefix, name)) if name == local => return Some(prefix.to_owned()),
            None if qname == local => return None,
            _ => {}
        }
    }
    let uri = node.tag_name().namespace()?;
    if node
        .namespaces()
        .any(|n| n.name().is_none() && n.uri() == uri)
    {
        return None;
    }
    node.namespaces()
        .find(|n| n.uri() == uri && n.name().is_some())
        .and_then(|n| n.name())
        .map(str::to_owned)
}

/// The prefix the attribute was written with, read from the source like
/// [`element_prefix`]. Several prefixes may share one namespace URI.
fn attribute_prefix(
    source: &str,
    node: roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> Option<String> {
    let uri = attr.namespace()?;
    if uri == ns::XML {
        return Some("xml".to_owned());
    }
    if let Some((prefix, name)) = source
        .get(attr.range_qname())
        .and_then(|qname| qname.split_once(':'))
    {
        if name == attr.name() && node.lookup_namespace_uri(Some(prefix)) == Some(uri) {
            return Some(prefix.to_owned());
        }
    }
    node.namespaces()
        .find(|n| n.uri() == uri && n.name().is_some())
        .and_then(|n| n.name())
        .map(str::to_owned)
}

/// Namespaces declared on this element: in-scope bindings that differ from
/// the parent's, plus `xmlns=""` when a default namespace is undeclared.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    let parent_scope: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
        .unwrap_or_default();

    let mut declared = Vec::new();
    let mut has_default = false;
    for n in node.namespaces() {
        if n.name() == Some("xml") {
            continue;
        }
        if n.name().is_none() {
            has_default = true;
        }
        if !parent_scope.contains(&(n.name(), n.uri())) {
            declared.push((n.name().unwrap_or("").to_owned(), n.uri().to_owned()));
        }
    }
    let parent_has_default = parent_scope
        .iter()
        .any(|(prefix, uri)| prefix.is_none() && !uri.is_empty());
    if parent_has_default && !has_default {
        declared.push((String::new(), String::new()));
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = r#"<root xmlns="urn:a" xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><item Id="x">v</item><ds:Signature><ds:SignedInfo/></ds:Signature></root>"#;

    #[test]
    fn parses_names_and_prefixes() {
        let doc = Document::parse(SIGNED).unwrap();
        let root = doc.document_element().unwrap();
        let e = doc.element(root).unwrap();
        assert_eq!(e.name.local_name, "root");
        assert_eq!(e.name.prefix, None);
        assert_eq!(e.name.namespace_uri.as_deref(), Some("urn:a"));
        assert_eq!(e.namespace_declarations.len(), 2);

        let sig = doc.find_element_from(root, "Signature", ns::DSIG).unwrap();
        let sig_el = doc.element(sig).unwrap();
        assert_eq!(sig_el.name.prefix.as_deref(), Some("ds"));
        assert!(sig_el.namespace_declarations.is_empty());
    }

    #[test]
    fn find_element_not_found() {
        let doc = Document::parse("<root><a/><b><c/></b></root>").unwrap();
        let root = doc.document_element_ref().unwrap();
        assert_eq!(doc.find_element(root, "Signature", ns::DSIG).unwrap(), None);
        // Same local name, wrong namespace.
        let doc = Document::parse("<root><Signature/></root>").unwrap();
        let root = doc.document_element_ref().unwrap();
        assert_eq!(doc.find_element(root, "Signature", ns::DSIG).unwrap(), None);
    }

    #[test]
    fn find_element_is_preorder_and_includes_root() {
        let doc = Document::parse(r#"<a><b n="1"><c/></b><c n="2"/></a>"#).unwrap();
        let root = doc.document_element_ref().unwrap();
        let a = doc.find_element(root, "a", "").unwrap().unwrap();
        assert_eq!(a, root);
        let c = doc.find_element(root, "c", "").unwrap().unwrap();
        let c_id = doc.resolve(c).unwrap();
        assert_eq!(doc.element(doc.parent(c_id).unwrap()).unwrap().name.local_name, "b");
    }

    #[test]
    fn foreign_and_detached_handles_are_rejected() {
        let doc = Document::parse("<a><b/></a>").unwrap();
        let other = Document::parse("<a><b/></a>").unwrap();
        let root = other.document_element_ref().unwrap();
        assert!(matches!(doc.resolve(root), Err(Error::InvalidNode(_))));
        assert!(matches!(
            doc.find_element(root, "b", ""),
            Err(Error::InvalidNode(_))
        ));

        let mut doc = doc;
        let a = doc.document_element().unwrap();
        let b = doc.child_elements(a)[0];
        let b_ref = doc.handle(b);
        assert!(doc.resolve(b_ref).is_ok());
        doc.detach(b).unwrap();
        assert!(matches!(doc.resolve(b_ref), Err(Error::InvalidNode(_))));
    }

    #[test]
    fn clone_gets_new_identity() {
        let doc = Document::parse("<a/>").unwrap();
        let copy = doc.clone();
        assert_ne!(doc.document_id(), copy.document_id());
        assert!(copy.resolve(doc.document_element_ref().unwrap()).is_err());
    }

    #[test]
    fn empty_document_has_no_root_element() {
        let doc = Document::new();
        assert!(matches!(
            doc.document_element_ref(),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn mutation() {
        let mut doc = Document::parse("<a><b/></a>").unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.child_elements(a)[0];
        let first = doc.insert_element_before(a, b, QName::local("first")).unwrap();
        doc.set_attribute(first, "k", "v").unwrap();
        doc.set_attribute(first, "k", "w").unwrap();
        doc.set_text(first, "hello").unwrap();
        assert_eq!(doc.child_elements(a), vec![first, b]);
        assert_eq!(doc.element(first).unwrap().attribute("k"), Some("w"));
        assert_eq!(doc.text_content(first), "hello");
        doc.set_text(first, "bye").unwrap();
        assert_eq!(doc.text_content(first), "bye");
        assert!(matches!(
            doc.append_element(doc.root(), QName::local("second-root")),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn undeclared_default_namespace_is_recorded() {
        let doc = Document::parse(r#"<a xmlns="urn:x"><b xmlns=""/></a>"#).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.child_elements(a)[0];
        let e = doc.element(b).unwrap();
        assert_eq!(e.name.namespace_uri, None);
        assert_eq!(
            e.namespace_declarations,
            vec![(String::new(), String::new())]
        );
        assert!(doc.in_scope_namespaces(b).is_empty());
    }

    #[test]
    fn xml_prefixed_attribute() {
        let doc = Document::parse(r#"<a xml:lang="en"/>"#).unwrap();
        let a = doc.document_element().unwrap();
        let attr = &doc.element(a).unwrap().attributes[0];
        assert_eq!(attr.name.prefix.as_deref(), Some("xml"));
        assert_eq!(doc.element(a).unwrap().attribute_ns(ns::XML, "lang"), Some("en"));
    }
}
