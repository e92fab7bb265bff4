//! Multipart form bodies.
//!
//! A [`Form`] is attached to a request as its payload. The body stage adds
//! the client and request form fields as text parts before encoding, so the
//! form only needs to carry the parts specific to the upload.
//!
//! ```
//! use courier_core::{Form, Part};
//!
//! let form = Form::with_boundary("xyz")
//!     .text("name", "John Doe")
//!     .part(Part::file("avatar", "photo.png", vec![0x89, 0x50]));
//!
//! let (content_type, body) = form.into_body();
//! assert_eq!(content_type, "multipart/form-data; boundary=xyz");
//! assert!(body.starts_with(b"--xyz\r\n"));
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// A single part in a multipart form.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Create a part without content type or filename.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Create a text field.
    ///
    /// Text fields are written without a `Content-Type`, the way browsers
    /// submit plain form inputs.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Bytes::from(value.into()))
    }

    /// Create a binary part (`application/octet-stream`).
    #[must_use]
    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, data).with_content_type("application/octet-stream")
    }

    /// Create a file part; the content type is guessed from the extension.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename);
        Self {
            name: name.into(),
            filename: Some(filename),
            content_type: Some(content_type.to_string()),
            data: data.into(),
        }
    }

    /// Set the filename for this part.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the content type for this part.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Part name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename, if set.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Part data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn write_to(&self, boundary: &str, buf: &mut BytesMut) {
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
        put_quoted(buf, &self.name);
        buf.put_u8(b'"');
        if let Some(filename) = &self.filename {
            buf.put_slice(b"; filename=\"");
            put_quoted(buf, filename);
            buf.put_u8(b'"');
        }
        buf.put_slice(b"\r\n");

        if let Some(content_type) = &self.content_type {
            buf.put_slice(b"Content-Type: ");
            buf.put_slice(content_type.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"\r\n");
        buf.put_slice(&self.data);
        buf.put_slice(b"\r\n");
    }
}

// Quotes and backslashes are escaped in disposition parameters.
fn put_quoted(buf: &mut BytesMut, value: &str) {
    for byte in value.bytes() {
        if matches!(byte, b'"' | b'\\') {
            buf.put_u8(b'\\');
        }
        buf.put_u8(byte);
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// A multipart form.
#[derive(Debug, Clone)]
pub struct Form {
    parts: Vec<Part>,
    boundary: String,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Create an empty form with a generated boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Create an empty form with a fixed boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            boundary: boundary.into(),
        }
    }

    /// Add a part to the form.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Add a text field to the form.
    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(Part::text(name, value))
    }

    /// Add a file to the form.
    #[must_use]
    pub fn file(
        self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.part(Part::file(name, filename, data))
    }

    /// Prepend text fields, keeping the order they are given in.
    pub fn prepend_text_fields<'a>(&mut self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let fields: Vec<Part> = fields
            .into_iter()
            .map(|(name, value)| Part::text(name, value))
            .collect();
        self.parts.splice(0..0, fields);
    }

    /// Boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Parts in this form.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns `true` if the form has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `Content-Type` header value for this form.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode the form, returning the content type and the body.
    #[must_use]
    pub fn into_body(self) -> (String, Bytes) {
        let content_type = self.content_type();
        let size: usize = self
            .parts
            .iter()
            .map(|part| part.data.len() + part.name.len() + 96)
            .sum();

        let mut buf = BytesMut::with_capacity(size + self.boundary.len() + 8);
        for part in &self.parts {
            part.write_to(&self.boundary, &mut buf);
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        (content_type, buf.freeze())
    }
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    format!("----CourierBoundary{timestamp:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_constructors() {
        let text = Part::text("field", "value");
        assert_eq!(text.data().as_ref(), b"value");
        assert!(text.content_type().is_none());

        let bytes = Part::bytes("data", vec![1, 2, 3]);
        assert_eq!(bytes.content_type(), Some("application/octet-stream"));

        let file = Part::file("upload", "PHOTO.JPG", vec![0xFF, 0xD8]);
        assert_eq!(file.filename(), Some("PHOTO.JPG"));
        assert_eq!(file.content_type(), Some("image/jpeg"));
    }

    #[test]
    fn form_boundary_is_generated() {
        let form = Form::new();
        assert!(form.is_empty());
        assert!(form.boundary().starts_with("----CourierBoundary"));
    }

    #[test]
    fn prepend_text_fields_keeps_upload_last() {
        let mut form = Form::with_boundary("b").file("upload", "a.txt", "x");
        form.prepend_text_fields([("user", "alice"), ("lang", "en")]);

        let names: Vec<_> = form.parts().iter().map(Part::name).collect();
        assert_eq!(names, ["user", "lang", "upload"]);
    }

    #[test]
    fn form_encode() {
        let form = Form::with_boundary("boundary123")
            .text("field", "value")
            .file("upload", "te\"st.txt", "file content");

        let (content_type, body) = form.into_body();
        assert_eq!(content_type, "multipart/form-data; boundary=boundary123");

        let body = String::from_utf8_lossy(&body);
        let expected = concat!(
            "--boundary123\r\n",
            "Content-Disposition: form-data; name=\"field\"\r\n",
            "\r\n",
            "value\r\n",
            "--boundary123\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"te\\\"st.txt\"\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "file content\r\n",
            "--boundary123--\r\n",
        );
        assert_eq!(body, expected);
    }

    #[test]
    fn guess_content_type_common() {
        assert_eq!(guess_content_type("doc.pdf"), "application/pdf");
        assert_eq!(guess_content_type("data.json"), "application/json");
        assert_eq!(guess_content_type("archive"), "application/octet-stream");
        assert_eq!(guess_content_type("unknown.xyz"), "application/octet-stream");
    }
}
