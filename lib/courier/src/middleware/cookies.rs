//! Cookie merge stage.

use courier_core::{Error, Result};
use http::HeaderValue;
use http::header::COOKIE;

use crate::stage::RequestStage;
use crate::{Client, Request};

/// Renders client and request cookies into one `Cookie` header.
///
/// Request cookies override client cookies of the same name. A `Cookie`
/// header set by hand is kept in front.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeCookies;

impl RequestStage for MergeCookies {
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        let common = &client.state().cookies;
        let rendered = common
            .iter()
            .filter(|cookie| {
                !request
                    .cookies
                    .iter()
                    .any(|own| own.name() == cookie.name())
            })
            .chain(request.cookies.iter())
            .map(|cookie| cookie.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if rendered.is_empty() {
            return Ok(());
        }

        let value = match request.headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}; {rendered}"),
            None => rendered,
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|err| Error::invalid_header(format!("cookie: {err}")))?;
        request.headers.insert(COOKIE, value);
        Ok(())
    }
}
