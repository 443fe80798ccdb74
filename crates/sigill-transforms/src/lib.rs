#![forbid(unsafe_code)]

//! Transform pipeline engine for sigill.
//!
//! Implements the transform chain model from XML-DSig: each reference
//! dereferences its URI, then applies its transforms in order.

pub mod base64_transform;
pub mod enveloped;
pub mod pipeline;
pub mod uri;
pub mod xpath_filter;

pub use pipeline::{transform_from_node, C14nTransform, Transform, TransformData, TransformPipeline};
pub use uri::resolve_uri;
