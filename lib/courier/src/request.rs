//! Per-call request builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use cookie::Cookie;
use courier_core::{
    CancelSignal, Error, Form, Method, Result, Trace, parse_query_string, to_document,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncWrite;
use url::Url;

use crate::client::ClientState;
use crate::{Response, dispatch};

/// Body source of a request, encoded by the body stage.
#[derive(Debug, Clone, Default)]
pub(crate) enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Json(serde_json::Value),
    Xml(serde_json::Value),
    Multipart(Form),
}

impl RequestBody {
    pub(crate) const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Where a download goes.
pub(crate) enum Output {
    File(PathBuf),
    Writer(Box<dyn AsyncWrite + Send + Sync + Unpin>),
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// One HTTP call being built.
///
/// Created by [`Client::r`](crate::Client::r); it captures the client
/// configuration at that moment. Setters consume and return the request,
/// and a terminal method ([`send`](Self::send), [`get`](Self::get), ...)
/// runs the pipeline. A request is dispatched at most once.
///
/// Invalid input given to a setter (a bad header name, a body that does not
/// serialize) does not panic: the first such error is kept and returned by
/// the terminal method without dispatching.
///
/// # Example
///
/// ```ignore
/// let response = client
///     .r()
///     .set_path_param("id", "42")
///     .set_header("x-trace", "on")
///     .get("/users/{id}")
///     .await?;
/// ```
#[must_use]
pub struct Request {
    pub(crate) client: Arc<ClientState>,
    pub(crate) method: Method,
    pub(crate) raw_url: String,
    pub(crate) url: Option<Url>,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: Vec<Cookie<'static>>,
    pub(crate) form_data: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) payload: Bytes,
    pub(crate) output: Option<Output>,
    pub(crate) trace_enabled: bool,
    pub(crate) trace: Option<Trace>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) deadline: Option<tokio::time::Instant>,
    pub(crate) cancel: Option<CancelSignal>,
    pub(crate) start_time: Option<Instant>,
    pub(crate) error: Option<Error>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("raw_url", &self.raw_url)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("output", &self.output)
            .field("trace_enabled", &self.trace_enabled)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Request {
    pub(crate) fn new(client: Arc<ClientState>) -> Self {
        Self {
            client,
            method: Method::Get,
            raw_url: String::new(),
            url: None,
            path_params: BTreeMap::new(),
            query_params: Vec::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            form_data: Vec::new(),
            body: RequestBody::Empty,
            payload: Bytes::new(),
            output: None,
            trace_enabled: false,
            trace: None,
            timeout: None,
            deadline: None,
            cancel: None,
            start_time: None,
            error: None,
        }
    }

    fn fail(mut self, error: Error) -> Self {
        self.error.get_or_insert(error);
        self
    }

    // ------------------------------------------------------------------
    // URL
    // ------------------------------------------------------------------

    /// Set the URL, absolute or relative to the client base URL.
    pub fn set_url(mut self, url: impl Into<String>) -> Self {
        self.raw_url = url.into();
        self
    }

    /// Set a `{name}` path parameter.
    pub fn set_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Set several path parameters.
    pub fn set_path_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a query parameter, replacing the values of `key`.
    pub fn set_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        replace_pair(&mut self.query_params, key.into(), value.into());
        self
    }

    /// Set several query parameters, each replacing the values of its key.
    pub fn set_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            replace_pair(&mut self.query_params, key.into(), value.into());
        }
        self
    }

    /// Add a query parameter value, keeping existing values of `key`.
    pub fn add_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Set query parameters from a raw query string such as `a=1&b=2`.
    pub fn set_query_string(mut self, query: &str) -> Self {
        match parse_query_string(query) {
            Ok(pairs) => {
                for (key, value) in pairs {
                    replace_pair(&mut self.query_params, key, value);
                }
                self
            }
            Err(err) => self.fail(err),
        }
    }

    // ------------------------------------------------------------------
    // Headers and cookies
    // ------------------------------------------------------------------

    /// Set a header, replacing previous values.
    pub fn set_header(mut self, name: &str, value: &str) -> Self {
        match header_pair(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Set several headers.
    pub fn set_headers<'a>(self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.set_header(name, value))
    }

    /// Set the `Content-Type` header.
    pub fn set_content_type(self, content_type: &str) -> Self {
        self.set_header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Authenticate with a bearer token.
    pub fn set_bearer_auth_token(self, token: &str) -> Self {
        self.set_header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// Authenticate with HTTP basic credentials.
    pub fn set_basic_auth(self, username: &str, password: &str) -> Self {
        self.set_header(AUTHORIZATION.as_str(), &basic_auth(username, password))
    }

    /// Add cookies; they override client cookies with the same name.
    pub fn set_cookies(mut self, cookies: impl IntoIterator<Item = Cookie<'static>>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    // ------------------------------------------------------------------
    // Body
    // ------------------------------------------------------------------

    /// Send raw bytes; the content type is sniffed unless set explicitly.
    pub fn set_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    /// Send a string.
    pub fn set_body_string(self, body: impl Into<String>) -> Self {
        self.set_body(Bytes::from(body.into()))
    }

    /// Send `value` encoded by the client JSON codec.
    pub fn set_body_json<T: serde::Serialize>(mut self, value: &T) -> Self {
        match to_document(value) {
            Ok(document) => {
                self.body = RequestBody::Json(document);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Send `value` encoded by the client XML codec.
    pub fn set_body_xml<T: serde::Serialize>(mut self, value: &T) -> Self {
        match to_document(value) {
            Ok(document) => {
                self.body = RequestBody::Xml(document);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Set form fields, each replacing the values of its key.
    ///
    /// Without a multipart form the fields are sent urlencoded; with one,
    /// they become text parts.
    pub fn set_form_data<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in fields {
            replace_pair(&mut self.form_data, key.into(), value.into());
        }
        self
    }

    /// Add a form field value, keeping existing values of `key`.
    pub fn add_form_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_data.push((key.into(), value.into()));
        self
    }

    /// Send a multipart form.
    pub fn set_multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    // ------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------

    /// Stream the response body into a file.
    ///
    /// Relative paths are resolved against the client output directory.
    pub fn set_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(Output::File(path.into()));
        self
    }

    /// Stream the response body into `writer`.
    pub fn set_output(mut self, writer: impl AsyncWrite + Send + Sync + Unpin + 'static) -> Self {
        self.output = Some(Output::Writer(Box::new(writer)));
        self
    }

    // ------------------------------------------------------------------
    // Call control
    // ------------------------------------------------------------------

    /// Record timings for this call, see [`Response::trace_info`].
    pub fn enable_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// Override the client timeout for this call.
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the call when `signal` is cancelled.
    pub fn set_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    // ------------------------------------------------------------------
    // Accessors, mostly for stages
    // ------------------------------------------------------------------

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Change the method.
    pub const fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// URL as given, before resolution.
    #[must_use]
    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    /// Resolved URL, available once the URL stage ran.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Path parameters.
    #[must_use]
    pub const fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    /// Mutable path parameters.
    pub const fn path_params_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.path_params
    }

    /// Query parameters.
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Mutable query parameters.
    pub const fn query_params_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.query_params
    }

    /// Request cookies.
    #[must_use]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Encoded payload, available once the body stage ran.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns `true` if the response is streamed to a file or writer.
    #[must_use]
    pub const fn is_download(&self) -> bool {
        self.output.is_some()
    }

    /// Returns `true` if timings are recorded for this call.
    #[must_use]
    pub const fn is_trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// Trace handle, attached by the trace stage.
    #[must_use]
    pub const fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// When the request was handed to the transport.
    #[must_use]
    pub const fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    // ------------------------------------------------------------------
    // Terminal methods
    // ------------------------------------------------------------------

    /// Run the pipeline with `method`.
    ///
    /// An empty `url` keeps the URL given to [`set_url`](Self::set_url).
    pub async fn send(mut self, method: Method, url: impl AsRef<str>) -> Result<Response> {
        self.method = method;
        let url = url.as_ref();
        if !url.is_empty() {
            url.clone_into(&mut self.raw_url);
        }
        dispatch::execute(self).await
    }

    /// Send a GET request.
    pub async fn get(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Get, url).await
    }

    /// Send a POST request.
    pub async fn post(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Post, url).await
    }

    /// Send a PUT request.
    pub async fn put(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Put, url).await
    }

    /// Send a PATCH request.
    pub async fn patch(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Patch, url).await
    }

    /// Send a DELETE request.
    pub async fn delete(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Delete, url).await
    }

    /// Send a HEAD request.
    pub async fn head(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Head, url).await
    }

    /// Send an OPTIONS request.
    pub async fn options(self, url: impl AsRef<str>) -> Result<Response> {
        self.send(Method::Options, url).await
    }
}

/// Replace every value of `key` by `value`, keeping the position of the
/// first occurrence.
pub(crate) fn replace_pair(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter().position(|(k, _)| *k == key) {
        Some(index) => {
            pairs.retain(|(k, _)| *k != key);
            pairs.insert(index.min(pairs.len()), (key, value));
        }
        None => pairs.push((key, value)),
    }
}

pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| Error::invalid_header(format!("{name}: {err}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|err| Error::invalid_header(format!("{name}: {err}")))?;
    Ok((header_name, header_value))
}

pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
