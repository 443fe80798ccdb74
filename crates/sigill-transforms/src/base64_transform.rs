#![forbid(unsafe_code)]

//! Base64 decode transform.

use crate::pipeline::{Transform, TransformData};
use base64::Engine;
use sigill_core::{Error, Result, TransformId};
use sigill_xml::NodeKind;

/// Base64 decode transform. A node set input is first reduced to the
/// string value of its text nodes.
pub struct Base64DecodeTransform;

impl Transform for Base64DecodeTransform {
    fn id(&self) -> TransformId {
        TransformId::Base64
    }

    fn execute<'d>(&self, input: TransformData<'d>) -> Result<TransformData<'d>> {
        let text = match &input {
            TransformData::Binary(data) => std::str::from_utf8(data)
                .map_err(|e| Error::Transform(format!("base64 input not UTF-8: {e}")))?
                .to_owned(),
            TransformData::Xml { doc, node_set } => {
                let mut text = String::new();
                for id in doc.descendants(doc.root()) {
                    if node_set.as_ref().is_some_and(|set| !set.contains(id)) {
                        continue;
                    }
                    if let Some(NodeKind::Text(t)) = doc.node_kind(id) {
                        text.push_str(t);
                    }
                }
                text
            }
        };

        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| Error::Base64(format!("decode error: {e}")))?;
        Ok(TransformData::Binary(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_xml::{Document, NodeSet};

    #[test]
    fn decodes_octets_ignoring_whitespace() {
        let out = Base64DecodeTransform
            .execute(TransformData::Binary(b"aGVs\n bG8=".to_vec()))
            .unwrap();
        assert_eq!(out.into_binary().unwrap(), b"hello");
    }

    #[test]
    fn decodes_text_of_selected_nodes() {
        let doc = Document::parse("<r><skip>Zm9v</skip><p>aGVs<i>bG8=</i></p></r>").unwrap();
        let p = doc.find_element_from(doc.root(), "p", "").unwrap();
        let set = NodeSet::tree_without_comments(&doc, p);
        let out = Base64DecodeTransform
            .execute(TransformData::xml(&doc, Some(set)))
            .unwrap();
        assert_eq!(out.into_binary().unwrap(), b"hello");
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(matches!(
            Base64DecodeTransform.execute(TransformData::Binary(b"!!!".to_vec())),
            Err(Error::Base64(_))
        ));
    }
}
