//! Built-in pipeline stages.
//!
//! These stages are anchored at fixed positions: the request stages run
//! after every user request stage, the response stages run before every
//! user response stage.
//!
//! # Request stages, in order
//!
//! - [`ResolveUrl`] - path params, base URL, default scheme and query params
//! - [`MergeHeaders`] - client headers under request headers
//! - [`MergeCookies`] - client cookies under request cookies, one `Cookie` header
//! - [`EncodeBody`] - multipart, form, JSON/XML or raw payload with its content type
//! - [`AttachTrace`] - trace handle for timed calls
//!
//! # Response stages, in order
//!
//! - [`AutoRead`] - buffers the body under the call deadline
//! - [`AutoDecode`] - transcodes allow-listed bodies to UTF-8
//! - [`Download`] - streams the body into a file or writer

mod body;
mod cookies;
mod decode;
mod download;
mod headers;
mod read;
mod resolve;
mod trace;

pub use body::EncodeBody;
pub use cookies::MergeCookies;
pub use decode::{AutoDecode, detect_charset};
pub(crate) use decode::transcode;
pub use download::Download;
pub use headers::MergeHeaders;
pub use read::AutoRead;
pub use resolve::ResolveUrl;
pub use trace::AttachTrace;

use crate::stage::{RequestStage, ResponseStage};

/// Request stages run after the user ones.
pub(crate) static REQUEST_STAGES: [&dyn RequestStage; 5] = [
    &ResolveUrl,
    &MergeHeaders,
    &MergeCookies,
    &EncodeBody,
    &AttachTrace,
];

/// Response stages run before the user ones.
pub(crate) static RESPONSE_STAGES: [&dyn ResponseStage; 3] = [&AutoRead, &AutoDecode, &Download];
