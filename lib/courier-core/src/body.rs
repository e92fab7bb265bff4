//! Body serialization utilities.

use bytes::Bytes;

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json; charset=utf-8`).
    Json,
    /// XML content type (`text/xml; charset=utf-8`).
    Xml,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain; charset=utf-8`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the header value used when the body is encoded.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Xml => "text/xml; charset=utf-8",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Guess the content type of a raw payload from its first bytes.
    ///
    /// Only distinguishes what the pipeline needs: JSON documents, XML
    /// documents, valid UTF-8 text and everything else.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Self {
        let trimmed = data.trim_ascii_start();
        match trimmed.first() {
            Some(b'{' | b'[') => Self::Json,
            Some(b'<') => Self::Xml,
            _ if std::str::from_utf8(data).is_ok() => Self::PlainText,
            _ => Self::OctetStream,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns `true` if a `Content-Type` value denotes JSON.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("json")
}

/// Returns `true` if a `Content-Type` value denotes XML.
#[must_use]
pub fn is_xml_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("xml")
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
///
/// Uses `serde_html_form` which supports `Vec<T>` and sequences of pairs
/// for repeated form fields (e.g., `tags=a&tags=b&tags=c`).
///
/// # Example
///
/// ```
/// use courier_core::to_form;
///
/// let fields = vec![("username", "alice"), ("tag", "a"), ("tag", "b")];
/// let bytes = to_form(&fields).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"username=alice&tag=a&tag=b");
/// ```
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_html_form::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// ```
/// use courier_core::to_query_string;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Search {
///     q: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     page: Option<u32>,
/// }
///
/// let search = Search { q: "rust".to_string(), page: Some(1) };
/// let query = to_query_string(&search).expect("serialize");
/// assert_eq!(query, "q=rust&page=1");
/// ```
pub fn to_query_string<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Parse a raw query string into ordered key/value pairs.
///
/// A leading `?` is ignored and repeated keys are preserved in order.
///
/// ```
/// use courier_core::parse_query_string;
///
/// let pairs = parse_query_string("?a=1&b=x%20y&a=2").expect("parse");
/// assert_eq!(pairs.len(), 3);
/// assert_eq!(pairs[1], ("b".to_string(), "x y".to_string()));
/// ```
pub fn parse_query_string(query: &str) -> Result<Vec<(String, String)>> {
    let query = query.trim().trim_start_matches('?');
    serde_urlencoded::from_str(query).map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so the error names the exact field that
/// failed to deserialize.
///
/// ```
/// use courier_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}

/// Convert a serializable value into the document model shared by codecs.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(Into::into)
}

/// Convert a codec document into a typed value, with path-aware errors.
pub fn from_document<T: serde::de::DeserializeOwned>(document: serde_json::Value) -> Result<T> {
    serde_path_to_error::deserialize(document).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
