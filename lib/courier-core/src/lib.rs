//! Core types and contracts for the courier HTTP client.
//!
//! This crate holds everything the request pipeline talks to through a
//! narrow contract:
//! - [`Error`] and [`Result`] - Error handling
//! - [`Method`] - HTTP method enum and its payload rules
//! - body helpers and [`ContentType`], plus the [`Marshal`]/[`Unmarshal`] codecs
//! - [`Form`] and [`Part`] - multipart bodies
//! - [`Transport`] with its [`TransportConfig`], [`TlsConfig`] and [`ProxyResolver`]
//! - [`RedirectPolicy`], [`CookieJar`], [`Logger`] and [`CancelSignal`]
//! - dump ([`Dumper`], [`DumpSink`], [`DumpOptions`]) and trace ([`Trace`], [`TraceInfo`])
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)
//! - [`header`] - HTTP header names (re-exported from `http` crate)

mod body;
mod cancel;
mod codec;
mod config;
mod dump;
mod error;
mod jar;
mod logger;
mod method;
mod multipart;
mod path;
pub mod prelude;
mod redirect;
mod trace;
mod transport;

pub use body::{
    ContentType, from_document, from_json, is_json_content_type, is_xml_content_type,
    parse_query_string, to_document, to_form, to_json, to_query_string,
};
pub use cancel::CancelSignal;
pub use codec::{JsonCodec, Marshal, Unmarshal, XmlCodec};
pub use config::{
    ClientAuth, EnvProxy, FixedProxy, ProxyResolver, TlsConfig, TransportConfig,
    TransportConfigBuilder,
};
pub use dump::{DEFAULT_DUMP_QUEUE_CAPACITY, DumpOptions, DumpSink, Dumper};
pub use error::{Error, Result};
pub use jar::{CookieJar, MemoryJar};
pub use logger::{DisabledLogger, Logger, TracingLogger};
pub use method::{Method, PayloadRule};
pub use multipart::{Form, Part};
pub use path::expand_path_params;
pub use redirect::{
    AllowedDomainRedirectPolicy, AllowedHostRedirectPolicy, DEFAULT_MAX_REDIRECTS,
    MaxRedirectPolicy, NextHop, NoRedirectPolicy, RedirectPolicy, SameDomainRedirectPolicy,
    SameHostRedirectPolicy,
};
pub use trace::{Trace, TraceInfo};
pub use transport::{BodyStream, Transport, TransportFuture, collect_body, empty_body, full_body};

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
