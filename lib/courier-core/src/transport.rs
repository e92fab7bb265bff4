//! Transport contract.

use std::future::Future;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::{Dumper, Result, TransportConfig};

/// Streaming response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Future returned by [`Transport::round_trip`].
pub type TransportFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<BodyStream>>> + Send>>;

/// Exchanges one finalized request for one raw response.
///
/// A transport never follows redirects, never retries and never buffers the
/// response body; those are pipeline concerns. Implementations own their
/// connection state, which is why cloning goes through
/// [`clone_transport`](Self::clone_transport) instead of `Clone`.
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    fn round_trip(&self, request: http::Request<Bytes>) -> TransportFuture;

    /// Structurally independent copy with the same configuration and no
    /// shared connection state.
    fn clone_transport(&self) -> Box<dyn Transport>;

    /// Current configuration.
    fn config(&self) -> &TransportConfig;

    /// Mutable configuration; changes apply to connections opened afterwards.
    fn config_mut(&mut self) -> &mut TransportConfig;

    /// Install or remove the wire dump tap.
    fn set_dumper(&mut self, dumper: Option<Dumper>);

    /// Installed dump tap.
    fn dumper(&self) -> Option<&Dumper>;
}

/// Body stream yielding `bytes` once.
#[must_use]
pub fn full_body(bytes: impl Into<Bytes>) -> BodyStream {
    let bytes = bytes.into();
    if bytes.is_empty() {
        return empty_body();
    }
    Box::pin(futures_util::stream::iter([Ok(bytes)]))
}

/// Body stream yielding nothing.
#[must_use]
pub fn empty_body() -> BodyStream {
    Box::pin(futures_util::stream::empty())
}

/// Read a body stream to the end.
pub async fn collect_body(mut body: BodyStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_concatenates_chunks() {
        let chunks: [Result<Bytes>; 2] = [Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
        let body: BodyStream = Box::pin(futures_util::stream::iter(chunks));
        let bytes = collect_body(body).await.expect("collect");
        assert_eq!(bytes.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn collect_stops_on_error() {
        let chunks: [Result<Bytes>; 2] = [
            Ok(Bytes::from("partial")),
            Err(crate::Error::connection("reset")),
        ];
        let body: BodyStream = Box::pin(futures_util::stream::iter(chunks));
        let err = collect_body(body).await.expect_err("should fail");
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn full_and_empty_bodies() {
        let bytes = collect_body(full_body("abc")).await.expect("collect");
        assert_eq!(bytes.as_ref(), b"abc");

        let bytes = collect_body(full_body(Bytes::new())).await.expect("collect");
        assert!(bytes.is_empty());
    }
}
