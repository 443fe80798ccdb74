#![forbid(unsafe_code)]

//! NodeSet type for XML canonicalization and transforms.
//!
//! A `NodeSet` is the XPath-style selection a Reference produces: the
//! document-subset that canonicalization renders. Attributes and namespace
//! nodes are not tracked individually; an element in the set renders its
//! own attribute and namespace axes.

use crate::document::{Document, NodeId, NodeKind};
use std::collections::HashSet;

/// A set of document nodes identified by [`NodeId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, comments included.
    pub fn all(doc: &Document) -> Self {
        Self::tree_with_comments(doc, doc.root())
    }

    /// Every node except comments. This is what `URI=""` selects.
    pub fn all_without_comments(doc: &Document) -> Self {
        Self::tree_without_comments(doc, doc.root())
    }

    /// The subtree rooted at `root`, without comments (`URI="#id"`).
    pub fn tree_without_comments(doc: &Document, root: NodeId) -> Self {
        let mut set = Self::new();
        collect_subtree(doc, root, &mut set.nodes, false);
        set
    }

    /// The subtree rooted at `root`, with comments (`#xpointer(id('x'))`).
    pub fn tree_with_comments(doc: &Document, root: NodeId) -> Self {
        let mut set = Self::new();
        collect_subtree(doc, root, &mut set.nodes, true);
        set
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id.index())
    }

    pub fn insert(&mut self, id: NodeId) {
        self.nodes.insert(id.index());
    }

    pub fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id.index());
    }

    /// Remove `root` and all its descendants.
    pub fn remove_subtree(&mut self, doc: &Document, root: NodeId) {
        self.nodes.remove(&root.index());
        for d in doc.descendants(root) {
            self.nodes.remove(&d.index());
        }
    }

    pub fn intersection(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.intersection(&other.nodes).copied().collect(),
        }
    }

    pub fn union(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.union(&other.nodes).copied().collect(),
        }
    }

    /// `self - other`.
    pub fn subtract(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.difference(&other.nodes).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(doc: &Document, root: NodeId, set: &mut HashSet<usize>, comments: bool) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !comments && matches!(doc.node_kind(id), Some(NodeKind::Comment(_))) {
            continue;
        }
        set.insert(id.index());
        stack.extend(doc.children(id).iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<a><!--c--><b><c/></b>text</a>";

    #[test]
    fn comments_are_excluded_on_request() {
        let doc = Document::parse(XML).unwrap();
        let all = NodeSet::all(&doc);
        let no_comments = NodeSet::all_without_comments(&doc);
        // document node, a, comment, b, c, text
        assert_eq!(all.len(), 6);
        assert_eq!(no_comments.len(), 5);
    }

    #[test]
    fn subtree_removal_and_set_ops() {
        let doc = Document::parse(XML).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.find_element_from(a, "b", "").unwrap();
        let c = doc.find_element_from(a, "c", "").unwrap();

        let mut set = NodeSet::all_without_comments(&doc);
        set.remove_subtree(&doc, b);
        assert!(!set.contains(b));
        assert!(!set.contains(c));
        assert!(set.contains(a));

        let sub = NodeSet::tree_without_comments(&doc, b);
        assert_eq!(sub.len(), 2);
        assert!(set.intersection(&sub).is_empty());
        assert_eq!(set.union(&sub), NodeSet::all_without_comments(&doc));
        assert_eq!(NodeSet::all_without_comments(&doc).subtract(&sub), set);
    }
}
