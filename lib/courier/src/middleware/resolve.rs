//! URL resolution stage.

use courier_core::{Result, expand_path_params};
use url::Url;

use crate::stage::RequestStage;
use crate::{Client, Request};

/// Builds the final URL of a request.
///
/// Request path params are substituted first, client path params fill the
/// remaining placeholders. A URL without scheme is appended to the client
/// base URL and, when still scheme-less, prefixed with the client scheme
/// (`http` when unset). Client query params come first; a request param
/// replaces every client value of its key. An empty port (`host:`) is
/// dropped by the URL parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveUrl;

impl RequestStage for ResolveUrl {
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        let state = client.state();

        let raw = expand_path_params(&request.raw_url, &request.path_params);
        let raw = expand_path_params(&raw, &state.path_params);

        let mut target = if has_scheme(&raw) || state.base_url.is_empty() {
            raw
        } else if raw.is_empty() || raw.starts_with('/') {
            format!("{}{raw}", state.base_url)
        } else {
            format!("{}/{raw}", state.base_url)
        };
        if !has_scheme(&target) {
            let scheme = if state.scheme.is_empty() {
                "http"
            } else {
                state.scheme.as_str()
            };
            target = format!("{scheme}://{target}");
        }

        let mut url = Url::parse(&target)?;

        let client_params = state
            .query_params
            .iter()
            .filter(|(key, _)| !request.query_params.iter().any(|(k, _)| k == key));
        let mut params = client_params.chain(request.query_params.iter()).peekable();
        if params.peek().is_some() {
            url.query_pairs_mut().extend_pairs(params);
        }

        tracing::debug!(url = %url, "resolved request url");
        request.url = Some(url);
        Ok(())
    }
}

fn has_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
