//! Header merge stage.

use courier_core::Result;

use crate::stage::RequestStage;
use crate::{Client, Request};

/// Layers request headers over the client common headers.
///
/// A header name set on the request replaces every client value for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeHeaders;

impl RequestStage for MergeHeaders {
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        let common = &client.state().headers;
        if common.is_empty() {
            return Ok(());
        }

        let mut merged = common.clone();
        for name in request.headers.keys() {
            merged.remove(name);
        }
        for (name, value) in &request.headers {
            merged.append(name.clone(), value.clone());
        }
        request.headers = merged;
        Ok(())
    }
}
