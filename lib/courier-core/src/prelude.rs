//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    CancelSignal, ContentType, CookieJar, Error, Form, Logger, Marshal, Method, Part,
    RedirectPolicy, Result, Transport, TransportConfig, Unmarshal, from_json, to_form, to_json,
};
