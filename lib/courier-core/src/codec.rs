//! Pluggable body codecs.
//!
//! Codecs work on a [`serde_json::Value`] document so they can be stored as
//! trait objects on a client. Typed values cross the boundary through
//! [`to_document`](crate::to_document) and
//! [`from_document`](crate::from_document).

use std::borrow::Cow;

use bytes::Bytes;
use serde_json::Value;

use crate::{Error, Result};

/// Turns a document into a request payload.
pub trait Marshal: Send + Sync {
    /// Encode the document.
    fn marshal(&self, document: &Value) -> Result<Bytes>;
}

/// Turns a response payload into a document.
pub trait Unmarshal: Send + Sync {
    /// Decode the payload.
    fn unmarshal(&self, data: &[u8]) -> Result<Value>;
}

impl<F> Marshal for F
where
    F: Fn(&Value) -> Result<Bytes> + Send + Sync,
{
    fn marshal(&self, document: &Value) -> Result<Bytes> {
        self(document)
    }
}

impl<F> Unmarshal for F
where
    F: Fn(&[u8]) -> Result<Value> + Send + Sync,
{
    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        self(data)
    }
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Marshal for JsonCodec {
    fn marshal(&self, document: &Value) -> Result<Bytes> {
        crate::to_json(document)
    }
}

impl Unmarshal for JsonCodec {
    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        crate::from_json(data)
    }
}

/// XML codec backed by `quick-xml`.
///
/// An object with a single key is written with that key as the root
/// element; any other document is wrapped in the configured root.
/// Decoded documents carry every scalar as a string, since XML has no
/// native number or boolean types.
#[derive(Debug, Clone)]
pub struct XmlCodec {
    root: Cow<'static, str>,
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::with_root("xml")
    }
}

impl XmlCodec {
    /// Codec wrapping documents in the given root element.
    #[must_use]
    pub fn with_root(root: impl Into<Cow<'static, str>>) -> Self {
        Self { root: root.into() }
    }
}

impl Marshal for XmlCodec {
    fn marshal(&self, document: &Value) -> Result<Bytes> {
        let encoded = match document {
            Value::Object(map) if map.len() == 1 => match map.iter().next() {
                Some((root, inner)) => quick_xml::se::to_string_with_root(root, inner),
                None => quick_xml::se::to_string_with_root(&self.root, document),
            },
            _ => quick_xml::se::to_string_with_root(&self.root, document),
        };
        encoded
            .map(Bytes::from)
            .map_err(|err| Error::XmlSerialization(err.to_string()))
    }
}

impl Unmarshal for XmlCodec {
    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(data)
            .map_err(|err| Error::XmlDeserialization(err.to_string()))?;
        quick_xml::de::from_str(text).map_err(|err| Error::XmlDeserialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_codec() {
        let bytes = JsonCodec.marshal(&json!({ "id": 7 })).expect("marshal");
        assert_eq!(bytes.as_ref(), br#"{"id":7}"#);

        let value = JsonCodec.unmarshal(br#"{"id": 7}"#).expect("unmarshal");
        assert_eq!(value, json!({ "id": 7 }));
    }

    #[test]
    fn xml_codec_uses_single_key_as_root() {
        let bytes = XmlCodec::default()
            .marshal(&json!({ "user": { "name": "alice" } }))
            .expect("marshal");
        assert_eq!(bytes.as_ref(), b"<user><name>alice</name></user>");
    }

    #[test]
    fn xml_codec_wraps_other_documents() {
        let bytes = XmlCodec::with_root("payload")
            .marshal(&json!({ "a": "1", "b": "2" }))
            .expect("marshal");
        assert_eq!(bytes.as_ref(), b"<payload><a>1</a><b>2</b></payload>");
    }

    #[test]
    fn xml_codec_decodes_object() {
        let value = XmlCodec::default()
            .unmarshal(b"<user><name>alice</name></user>")
            .expect("unmarshal");
        assert!(value.is_object());
    }

    #[test]
    fn closures_are_codecs() {
        let upper = |document: &Value| -> Result<Bytes> {
            Ok(Bytes::from(document.to_string().to_uppercase()))
        };
        let bytes = upper.marshal(&json!("abc")).expect("marshal");
        assert_eq!(bytes.as_ref(), br#""ABC""#);
    }
}
