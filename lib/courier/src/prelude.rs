//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use std::time::Duration;

pub use crate::{
    CancelSignal, Client, ContentType, Cookie, Error, Form, Method, Part, Request, RequestStage,
    Response, ResponseStage, Result, StatusCode, header,
};
pub use http::HeaderValue;
pub use serde::{Deserialize, Serialize};
