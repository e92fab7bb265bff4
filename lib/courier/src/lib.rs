//! Fluent HTTP client with an ordered request/response pipeline.
//!
//! A [`Client`] holds the defaults shared by every call: base URL, common
//! headers, cookies and params, codecs, redirect policies, the cookie jar
//! and the [`Transport`]. Each call is a [`Request`] built from a snapshot
//! of those defaults and sent once:
//!
//! 1. user [`RequestStage`]s, in registration order,
//! 2. built-in request stages (see [`middleware`]),
//! 3. the exchange, following redirects, under the call deadline,
//! 4. built-in response stages (auto-read, auto-decode, download),
//! 5. user [`ResponseStage`]s.
//!
//! The first failing stage ends the call with its error.
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let mut client = Client::new();
//! client
//!     .set_base_url("https://api.example.com")
//!     .set_user_agent("courier-example")
//!     .on_before_request(|_client: &Client, request: &mut Request| {
//!         request.headers_mut().insert("x-request-id", HeaderValue::from_static("42"));
//!         Ok(())
//!     });
//!
//! let mut response = client.r().set_path_param("id", "42").get("/users/{id}").await?;
//! let user: User = response.json().await?;
//! ```
//!
//! For one-off calls the process-wide default client is available through
//! [`get`], [`post`], [`r`] and friends.

mod client;
mod config;
mod connector;
mod decompression;
mod default;
mod dispatch;
pub mod middleware;
pub mod prelude;
mod request;
mod response;
mod service;
mod stage;
mod transport;

pub use client::{Client, DEFAULT_TIMEOUT};
pub use config::{
    AnyContentType, ContentTypeKeywords, ContentTypePredicate, DEFAULT_DECODED_CONTENT_TYPES,
    ResponseOptions,
};
pub use connector::{CourierConnector, ProxyConnector, https_connector};
pub use default::{
    default_client, delete, get, head, new_request, options, patch, post, put, r,
    set_default_client,
};
pub use request::Request;
pub use response::Response;
pub use service::ServiceTransport;
pub use stage::{RequestStage, ResponseStage, StageFuture};
pub use transport::HyperTransport;

// Re-export tower for transport composition
pub use tower;

pub use cookie::Cookie;
pub use courier_core::*;
