#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use crate::base64_transform::Base64DecodeTransform;
use crate::enveloped::EnvelopedSignatureTransform;
use crate::xpath_filter::XPathFilterTransform;
use sigill_c14n::C14nMode;
use sigill_core::{ns, Error, Result, TransformId};
use sigill_xml::{Document, NodeId, NodeSet};
use std::borrow::Cow;

/// Data flowing through the transform pipeline.
pub enum TransformData<'d> {
    /// A node set over a document. The document is borrowed when it is the
    /// one being signed and owned when it was parsed from octets mid-chain.
    Xml {
        doc: Cow<'d, Document>,
        node_set: Option<NodeSet>,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl<'d> TransformData<'d> {
    /// A node set over a borrowed document.
    pub fn xml(doc: &'d Document, node_set: Option<NodeSet>) -> Self {
        TransformData::Xml {
            doc: Cow::Borrowed(doc),
            node_set,
        }
    }

    pub fn is_xml(&self) -> bool {
        matches!(self, TransformData::Xml { .. })
    }

    /// Convert to octets. A node set left at the end of the chain is
    /// serialized with inclusive C14N 1.0.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        match self {
            TransformData::Binary(data) => Ok(data.clone()),
            TransformData::Xml { doc, node_set } => {
                sigill_c14n::canonicalize(doc, C14nMode::Inclusive, node_set.as_ref(), &[])
            }
        }
    }

    /// [`TransformData::to_binary`] without copying octets.
    pub fn into_binary(self) -> Result<Vec<u8>> {
        match self {
            TransformData::Binary(data) => Ok(data),
            xml => xml.to_binary(),
        }
    }
}

impl std::fmt::Debug for TransformData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformData::Xml { doc, node_set } => f
                .debug_struct("Xml")
                .field("document", &doc.document_id())
                .field("nodes", &node_set.as_ref().map(NodeSet::len))
                .finish(),
            TransformData::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send {
    fn id(&self) -> TransformId;

    /// Execute the transform on the given data.
    fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Build the pipeline described by a `<Transforms>` element. `None`
    /// yields an empty pipeline.
    pub fn from_transforms_node(
        doc: &Document,
        transforms: Option<NodeId>,
        signature: NodeId,
    ) -> Result<Self> {
        let mut pipeline = Self::new();
        if let Some(transforms) = transforms {
            for node in doc.find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
                pipeline.push(transform_from_node(doc, node, signature)?);
            }
        }
        Ok(pipeline)
    }

    /// Execute all transforms in order.
    pub fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>> {
        let mut data = input;
        for transform in &self.transforms {
            tracing::trace!(transform = %transform.id(), input = ?data, "applying transform");
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Identifiers of the transforms, in execution order.
    pub fn ids(&self) -> Vec<TransformId> {
        self.transforms.iter().map(|t| t.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Build a transform from a `<Transform>` element.
///
/// `signature` is the enclosing `<Signature>`, which the enveloped
/// transform removes.
pub fn transform_from_node(
    doc: &Document,
    node: NodeId,
    signature: NodeId,
) -> Result<Box<dyn Transform>> {
    let element = doc
        .element(node)
        .ok_or_else(|| Error::XmlStructure("Transform is not an element".into()))?;
    let uri = element
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on Transform".into()))?;
    let id = TransformId::from_uri(uri)
        .filter(|id| id.is_reference_transform())
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))?;

    Ok(match id {
        TransformId::Enveloped => Box::new(EnvelopedSignatureTransform::new(signature)),
        TransformId::Base64 => Box::new(Base64DecodeTransform),
        TransformId::XPath => {
            let expression = doc
                .find_child_element(node, ns::DSIG, ns::node::XPATH)
                .ok_or_else(|| Error::MissingElement("XPath".into()))?;
            Box::new(XPathFilterTransform::from_node(doc, expression)?)
        }
        c14n => {
            let mode = C14nMode::try_from(c14n)?;
            let prefixes = if mode.is_exclusive() {
                read_inclusive_prefixes(doc, node)
            } else {
                Vec::new()
            };
            Box::new(C14nTransform::new(mode, prefixes))
        }
    })
}

/// The `PrefixList` of an exclusive C14N `InclusiveNamespaces` child.
pub fn read_inclusive_prefixes(doc: &Document, node: NodeId) -> Vec<String> {
    doc.find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|child| doc.element(child))
        .and_then(|e| e.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn id(&self) -> TransformId {
        self.mode.transform_id()
    }

    fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>> {
        let bytes = match input {
            TransformData::Xml { doc, node_set } => sigill_c14n::canonicalize(
                &doc,
                self.mode,
                node_set.as_ref(),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => {
                let doc = Document::parse_bytes(&data)?;
                sigill_c14n::canonicalize(&doc, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}
