//! Response type.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use cookie::Cookie;
use courier_core::{
    BodyStream, Error, Result, TraceInfo, collect_body, from_document, full_body,
};
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, StatusCode, Version};
use url::Url;

use crate::Request;
use crate::middleware::transcode;

pub(crate) enum Body {
    Stream(BodyStream),
    Buffered(Bytes),
    Consumed,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Consumed => f.write_str("Consumed"),
        }
    }
}

/// HTTP response together with the request that produced it.
///
/// The body is read from the network at most once. Unless auto-read is
/// disabled or the call is a download, it is already buffered when the
/// response is returned; otherwise the first accessor reading it buffers it.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Body,
    url: Url,
    request: Request,
    received_at: Instant,
    transcoded: bool,
}

impl Response {
    pub(crate) fn new(raw: http::Response<BodyStream>, request: Request, url: Url) -> Self {
        let (parts, body) = raw.into_parts();
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body: Body::Stream(body),
            url,
            request,
            received_at: Instant::now(),
            transcoded: false,
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Status code as a number.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns `true` for 2xx responses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns `true` for 4xx and 5xx responses.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// HTTP version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Cookies set by the response.
    #[must_use]
    pub fn cookies(&self) -> Vec<Cookie<'static>> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .collect()
    }

    /// URL of the last hop, after redirects.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request that produced this response.
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// When the response headers were received.
    #[must_use]
    pub const fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Time between dispatch and the response headers.
    #[must_use]
    pub fn time(&self) -> Option<Duration> {
        self.request
            .start_time
            .map(|start| self.received_at.saturating_duration_since(start))
    }

    /// Timings, when tracing was enabled for the call.
    #[must_use]
    pub fn trace_info(&self) -> Option<TraceInfo> {
        self.request.trace.as_ref().map(courier_core::Trace::info)
    }

    /// Returns `true` if the body has been read into memory.
    #[must_use]
    pub const fn is_buffered(&self) -> bool {
        matches!(self.body, Body::Buffered(_))
    }

    /// Buffered body, without reading from the network.
    #[must_use]
    pub const fn buffered(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Read the whole body.
    ///
    /// The first call drains the network stream and, unless auto-decode is
    /// off for this content type, transcodes it to UTF-8; later calls return
    /// the buffered copy.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.body, Body::Consumed) {
            Body::Buffered(bytes) => {
                self.body = Body::Buffered(bytes);
            }
            Body::Stream(stream) => {
                self.body = Body::Buffered(collect_body(stream).await?);
            }
            Body::Consumed => return Err(Error::BodyConsumed),
        }
        self.transcode()?;
        match &self.body {
            Body::Buffered(bytes) => Ok(bytes.clone()),
            _ => Err(Error::BodyConsumed),
        }
    }

    /// Read the body as UTF-8 text.
    ///
    /// Bodies in other charsets are already transcoded by auto-decode when
    /// their content type is decoded.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::decode("utf-8"))
    }

    /// Read the body as JSON through the client JSON codec.
    pub async fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes().await?;
        let document = self.request.client.json_unmarshal.unmarshal(&bytes)?;
        from_document(document)
    }

    /// Read the body as XML through the client XML codec.
    pub async fn xml<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes().await?;
        let document = self.request.client.xml_unmarshal.unmarshal(&bytes)?;
        from_document(document)
    }

    /// Take the body as a stream.
    ///
    /// A buffered body is replayed; a live stream is handed over and the
    /// body is then consumed.
    pub fn body_stream(&mut self) -> Result<BodyStream> {
        match std::mem::replace(&mut self.body, Body::Consumed) {
            Body::Buffered(bytes) => {
                self.body = Body::Buffered(bytes.clone());
                Ok(full_body(bytes))
            }
            Body::Stream(stream) => Ok(stream),
            Body::Consumed => Err(Error::BodyConsumed),
        }
    }

    /// Turn 4xx and 5xx responses into [`Error::Http`].
    pub fn error_for_status(self) -> Result<Self> {
        if !self.is_error() {
            return Ok(self);
        }
        let message = self
            .status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
        Err(match self.buffered() {
            Some(body) => Error::http_with_body(self.status_code(), message, body.clone()),
            None => Error::http(self.status_code(), message),
        })
    }

    /// Transcode the buffered body to UTF-8, at most once.
    pub(crate) fn transcode(&mut self) -> Result<()> {
        if self.transcoded {
            return Ok(());
        }
        let Body::Buffered(body) = &self.body else {
            return Ok(());
        };
        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let decoded = transcode(&self.request.client.response_options, content_type, body)?;
        self.transcoded = true;
        if let Some(decoded) = decoded {
            self.body = Body::Buffered(decoded);
        }
        Ok(())
    }

    pub(crate) fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Consumed)
    }

    pub(crate) const fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde::Deserialize;

    use super::*;
    use crate::Client;

    fn response(status: u16, content_type: &str, body: &'static str) -> Response {
        let raw = http::Response::builder()
            .status(status)
            .header(CONTENT_TYPE, content_type)
            .header(SET_COOKIE, "session=abc; Path=/")
            .body(full_body(body))
            .expect("response");
        let url = Url::parse("http://api.test/users").expect("url");
        Response::new(raw, Client::new().r(), url)
    }

    #[tokio::test]
    async fn body_is_read_once_then_buffered() {
        let mut response = response(200, "text/plain", "hello");
        check!(!response.is_buffered());

        check!(response.text().await.expect("text") == "hello");
        check!(response.is_buffered());
        check!(response.bytes().await.expect("bytes").as_ref() == b"hello");
    }

    #[tokio::test]
    async fn unread_body_is_transcoded_when_first_read() {
        let (gbk, _, _) = encoding_rs::GBK.encode("你好");
        let raw = http::Response::builder()
            .header(CONTENT_TYPE, "text/plain; charset=gbk")
            .body(full_body(gbk.into_owned()))
            .expect("response");
        let url = Url::parse("http://api.test/greeting").expect("url");
        let mut response = Response::new(raw, Client::new().r(), url);

        check!(response.text().await.expect("text") == "你好");
        check!(response.text().await.expect("text") == "你好");
    }

    #[tokio::test]
    async fn stream_then_read_is_consumed() {
        let mut response = response(200, "text/plain", "hello");
        let stream = response.body_stream().expect("stream");
        let body = collect_body(stream).await.expect("collect");
        check!(body.as_ref() == b"hello");

        let_assert!(Err(Error::BodyConsumed) = response.bytes().await);
    }

    #[tokio::test]
    async fn json_uses_client_codec() {
        #[derive(Debug, Deserialize)]
        struct User {
            name: String,
        }

        let mut response = response(200, "application/json", r#"{"name":"alice"}"#);
        let user: User = response.json().await.expect("json");
        check!(user.name == "alice");
    }

    #[tokio::test]
    async fn json_error_names_the_field() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct User {
            id: u64,
        }

        let mut response = response(200, "application/json", r#"{"id":"nope"}"#);
        let_assert!(Err(Error::JsonDeserialization { path, .. }) = response.json::<User>().await);
        check!(path == "id");
    }

    #[tokio::test]
    async fn error_for_status_keeps_buffered_body() {
        let mut response = response(404, "text/plain", "missing");
        response.bytes().await.expect("bytes");

        let err = response.error_for_status().expect_err("404");
        check!(err.status() == Some(404));
        check!(err.body().map(Bytes::as_ref) == Some(&b"missing"[..]));
    }

    #[test]
    fn accessors() {
        let response = response(201, "application/json; charset=utf-8", "{}");
        check!(response.status() == StatusCode::CREATED);
        check!(response.is_success());
        check!(response.content_type() == Some("application/json; charset=utf-8"));
        check!(response.url().as_str() == "http://api.test/users");
        check!(response.trace_info().is_none());

        let cookies = response.cookies();
        check!(cookies.len() == 1);
        check!(cookies.first().map(Cookie::name) == Some("session"));
    }
}
