//! Call execution.
//!
//! Runs the request stages, then the exchange (redirect hops included)
//! under the call deadline, then the response stages.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use courier_core::{CancelSignal, Error, Method, NextHop, Result};
use http::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, PROXY_AUTHORIZATION,
    SET_COOKIE, WWW_AUTHENTICATE,
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::Instrument;
use url::Url;

use crate::client::ClientState;
use crate::middleware::{REQUEST_STAGES, RESPONSE_STAGES};
use crate::{Client, Request, Response};

/// Headers dropped when a redirect leaves the original host or port.
static SENSITIVE_HEADERS: [HeaderName; 5] = [
    AUTHORIZATION,
    COOKIE,
    HeaderName::from_static("cookie2"),
    PROXY_AUTHORIZATION,
    WWW_AUTHENTICATE,
];

/// Run `future` until `deadline` or until `cancel` fires.
pub(crate) async fn guarded<T>(
    future: impl Future<Output = Result<T>>,
    deadline: Option<tokio::time::Instant>,
    cancel: Option<&CancelSignal>,
) -> Result<T> {
    let bounded = async move {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| Error::Timeout)?,
            None => future.await,
        }
    };

    match cancel {
        Some(cancel) => {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Error::Cancelled),
                result = bounded => result,
            }
        }
        None => bounded.await,
    }
}

pub(crate) async fn execute(request: Request) -> Result<Response> {
    let span = tracing::debug_span!(
        "http_request",
        method = %request.method,
        url = %request.raw_url,
    );
    run(request).instrument(span).await
}

async fn run(mut request: Request) -> Result<Response> {
    if let Some(error) = request.error.take() {
        return Err(error);
    }

    let client = Client::from_state(Arc::clone(&request.client));
    let state = client.state();

    for stage in &state.before_request {
        stage
            .before_request(&client, &mut request)
            .inspect_err(|err| tracing::debug!(stage = stage.name(), %err, "request stage failed"))?;
    }
    for stage in REQUEST_STAGES {
        stage
            .before_request(&client, &mut request)
            .inspect_err(|err| tracing::debug!(stage = stage.name(), %err, "request stage failed"))?;
    }

    let timeout = request.timeout.unwrap_or(state.timeout);
    let deadline = (!timeout.is_zero()).then(|| tokio::time::Instant::now() + timeout);
    request.deadline = deadline;
    let cancel = request.cancel.clone();

    let mut response = guarded(exchange(state, request), deadline, cancel.as_ref()).await?;

    for stage in RESPONSE_STAGES {
        stage
            .after_response(&client, &mut response)
            .await
            .inspect_err(|err| tracing::debug!(stage = stage.name(), %err, "response stage failed"))?;
    }
    for stage in &state.after_response {
        stage
            .after_response(&client, &mut response)
            .await
            .inspect_err(|err| tracing::debug!(stage = stage.name(), %err, "response stage failed"))?;
    }

    if let Some(trace) = response.request().trace() {
        trace.record_total();
    }
    tracing::debug!(status = response.status_code(), "request completed");
    Ok(response)
}

/// Send the request, following redirects.
async fn exchange(state: &ClientState, mut request: Request) -> Result<Response> {
    let mut url = request
        .url
        .clone()
        .ok_or_else(|| Error::invalid_request("request URL was not resolved"))?;
    let mut method = request.method;
    let mut headers = request.headers.clone();
    let mut payload = request.payload.clone();
    let mut via = Vec::new();

    request.start_time = Some(Instant::now());
    if state.debug_log {
        state.log.debug(format_args!("{method} {url}"));
    }

    loop {
        let wire = wire_request(state, &request, method, &url, &headers, &payload)?;
        let raw = state.transport.get().round_trip(wire).await?;

        if let Some(jar) = &state.jar {
            jar.set_cookies(&mut raw.headers().get_all(SET_COOKIE).iter(), &url);
        }

        let Some(location) = redirect_location(raw.status(), raw.headers()) else {
            return Ok(Response::new(raw, request, url));
        };
        let next = url
            .join(&location)
            .map_err(|err| Error::InvalidRedirect(format!("{location}: {err}")))?;
        let next_method = redirect_method(raw.status(), method);

        via.push(url.clone());
        let hop = NextHop {
            method: next_method,
            url: &next,
            status: raw.status().as_u16(),
        };
        match state
            .redirect_policies
            .iter()
            .try_for_each(|policy| policy.check(&hop, &via))
        {
            Ok(()) => {}
            Err(Error::UseLastResponse) => return Ok(Response::new(raw, request, url)),
            Err(err) => return Err(err),
        }

        if changes_origin(&url, &next) {
            for name in &SENSITIVE_HEADERS {
                headers.remove(name);
            }
        }
        if next_method != method {
            payload = Bytes::new();
            headers.remove(CONTENT_TYPE);
            headers.remove(CONTENT_LENGTH);
        }

        if let Some(trace) = &request.trace {
            trace.record_redirect();
        }
        if state.debug_log {
            state.log.debug(format_args!("<redirect> {next_method} {next}"));
        }
        url = next;
        method = next_method;
    }
}

fn wire_request(
    state: &ClientState,
    request: &Request,
    method: Method,
    url: &Url,
    headers: &HeaderMap,
    payload: &Bytes,
) -> Result<http::Request<Bytes>> {
    let mut wire = http::Request::builder()
        .method(http::Method::from(method))
        .uri(url.as_str())
        .body(payload.clone())
        .map_err(|err| Error::invalid_request(err.to_string()))?;
    *wire.headers_mut() = headers.clone();

    if let Some(cookies) = state.jar.as_ref().and_then(|jar| jar.cookies(url)) {
        let merged = match wire.headers().get(COOKIE) {
            Some(existing) => {
                let mut value = existing.as_bytes().to_vec();
                value.extend_from_slice(b"; ");
                value.extend_from_slice(cookies.as_bytes());
                HeaderValue::from_bytes(&value).unwrap_or(cookies)
            }
            None => cookies,
        };
        wire.headers_mut().insert(COOKIE, merged);
    }
    if let Some(trace) = &request.trace {
        wire.extensions_mut().insert(trace.clone());
    }
    Ok(wire)
}

fn redirect_location(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// 307 and 308 replay the request; other redirects switch to GET except for HEAD.
fn redirect_method(status: StatusCode, method: Method) -> Method {
    match status.as_u16() {
        307 | 308 => method,
        _ if method == Method::Head => method,
        _ => Method::Get,
    }
}

fn changes_origin(from: &Url, to: &Url) -> bool {
    from.host_str() != to.host_str() || from.port_or_known_default() != to.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert2::{check, let_assert};

    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("url")
    }

    #[test]
    fn redirect_methods() {
        check!(redirect_method(StatusCode::FOUND, Method::Post) == Method::Get);
        check!(redirect_method(StatusCode::SEE_OTHER, Method::Put) == Method::Get);
        check!(redirect_method(StatusCode::MOVED_PERMANENTLY, Method::Head) == Method::Head);
        check!(redirect_method(StatusCode::TEMPORARY_REDIRECT, Method::Post) == Method::Post);
        check!(redirect_method(StatusCode::PERMANENT_REDIRECT, Method::Patch) == Method::Patch);
    }

    #[test]
    fn origin_changes() {
        check!(!changes_origin(&url("http://a.test/x"), &url("http://a.test:80/y")));
        check!(changes_origin(&url("http://a.test/x"), &url("http://b.test/x")));
        check!(changes_origin(&url("http://a.test/x"), &url("http://a.test:8080/x")));
    }

    #[test]
    fn location_only_for_redirect_statuses() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/next"));

        check!(redirect_location(StatusCode::FOUND, &headers).as_deref() == Some("/next"));
        check!(redirect_location(StatusCode::NOT_MODIFIED, &headers).is_none());
        check!(redirect_location(StatusCode::FOUND, &HeaderMap::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses() {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        let slow = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        };
        let_assert!(Err(Error::Timeout) = guarded(slow, Some(deadline), None).await);
    }

    #[tokio::test]
    async fn cancel_wins() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let pending = std::future::pending::<Result<()>>();
        let_assert!(Err(Error::Cancelled) = guarded(pending, None, Some(&cancel)).await);
    }

    #[tokio::test]
    async fn unguarded_result_passes_through() {
        let result = guarded(async { Ok(42) }, None, None).await;
        let_assert!(Ok(42) = result);
    }
}
