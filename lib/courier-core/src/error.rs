//! Error types for courier.

use derive_more::{Display, Error, From};

/// Main error type for courier operations.
///
/// Every stage of the pipeline reports failures through this type, so
/// callers only ever match on one enum whether the failure came from a
/// request stage, the transport, a redirect policy or a response stage.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// HTTP-level errors (non-2xx status codes), raised on demand by
    /// `Response::error_for_status`.
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Response body, if available.
        #[error(not(source))]
        body: Option<bytes::Bytes>,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors, including invalid certificate material.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// The request deadline elapsed.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request was cancelled through its cancel signal.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// A header name or value could not be represented on the wire.
    #[display("invalid header: {_0}")]
    #[from(skip)]
    InvalidHeader(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// XML serialization error.
    #[display("XML serialization error: {_0}")]
    #[from(skip)]
    XmlSerialization(#[error(not(source))] String),

    /// XML deserialization error.
    #[display("XML deserialization error: {_0}")]
    #[from(skip)]
    XmlDeserialization(#[error(not(source))] String),

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// Query string parsing error.
    #[display("query string error: {_0}")]
    #[from]
    QueryString(serde_urlencoded::de::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Too many redirects.
    #[display("too many redirects ({count} exceeded max of {max})")]
    #[from(skip)]
    TooManyRedirects {
        /// Number of redirects followed.
        count: usize,
        /// Maximum allowed redirects.
        max: usize,
    },

    /// Invalid redirect response.
    #[display("invalid redirect: {_0}")]
    #[from(skip)]
    InvalidRedirect(#[error(not(source))] String),

    /// A redirect policy refused the next hop.
    #[display("redirect refused: {_0}")]
    #[from(skip)]
    Redirect(#[error(not(source))] String),

    /// Sentinel returned by a redirect policy to stop following redirects
    /// and hand the last redirect response back to the caller.
    #[display("redirect stopped, using last response")]
    #[from(skip)]
    UseLastResponse,

    /// The response body could not be decoded with its declared charset.
    #[display("cannot decode body as {charset}")]
    #[from(skip)]
    Decode {
        /// Charset label used for decoding.
        charset: String,
    },

    /// I/O error (download target, dump file, certificate files).
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// The response body was already consumed by a stream or a download.
    #[display("response body already consumed")]
    #[from(skip)]
    BodyConsumed,

    /// Error raised by a user supplied stage.
    #[display("stage error: {_0}")]
    #[from(skip)]
    Stage(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an HTTP error from status code and message.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create an HTTP error with body.
    #[must_use]
    pub fn http_with_body(status: u16, message: impl Into<String>, body: bytes::Bytes) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: Some(body),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid header error.
    #[must_use]
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// Create a redirect refusal, typically from a custom redirect policy.
    #[must_use]
    pub fn redirect(message: impl Into<String>) -> Self {
        Self::Redirect(message.into())
    }

    /// Create a stage error.
    #[must_use]
    pub fn stage(message: impl Into<String>) -> Self {
        Self::Stage(message.into())
    }

    /// Create a charset decode error.
    #[must_use]
    pub fn decode(charset: impl Into<String>) -> Self {
        Self::Decode {
            charset: charset.into(),
        }
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if redirect handling produced this error.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(
            self,
            Self::TooManyRedirects { .. } | Self::InvalidRedirect(_) | Self::Redirect(_)
        )
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns the response body if this is an HTTP error with a body.
    #[must_use]
    pub fn body(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
