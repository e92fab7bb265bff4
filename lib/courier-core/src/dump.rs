//! Wire dump.
//!
//! A [`Dumper`] is installed on a transport and copies the request head and
//! body it writes, and the response head and body it reads, to a
//! [`DumpSink`]. What gets copied is selected by [`DumpOptions`].

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::StreamExt;
use http::HeaderMap;

use crate::BodyStream;

/// Chunks buffered by an asynchronous sink before new ones are dropped.
pub const DEFAULT_DUMP_QUEUE_CAPACITY: usize = 1024;

/// Which parts of the exchange are dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DumpOptions {
    /// Request line and headers.
    pub request_header: bool,
    /// Request body.
    pub request_body: bool,
    /// Status line and headers.
    pub response_header: bool,
    /// Response body.
    pub response_body: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl DumpOptions {
    /// Everything.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            request_header: true,
            request_body: true,
            response_header: true,
            response_body: true,
        }
    }

    /// Request head and body only.
    #[must_use]
    pub const fn only_request() -> Self {
        Self {
            request_header: true,
            request_body: true,
            response_header: false,
            response_body: false,
        }
    }

    /// Response head and body only.
    #[must_use]
    pub const fn only_response() -> Self {
        Self {
            request_header: false,
            request_body: false,
            response_header: true,
            response_body: true,
        }
    }

    /// Heads only, both directions.
    #[must_use]
    pub const fn only_header() -> Self {
        Self {
            request_header: true,
            request_body: false,
            response_header: true,
            response_body: false,
        }
    }

    /// Bodies only, both directions.
    #[must_use]
    pub const fn only_body() -> Self {
        Self {
            request_header: false,
            request_body: true,
            response_header: false,
            response_body: true,
        }
    }

    /// Everything but the request body.
    #[must_use]
    pub const fn no_request_body() -> Self {
        Self {
            request_body: false,
            ..Self::all()
        }
    }

    /// Everything but the response body.
    #[must_use]
    pub const fn no_response_body() -> Self {
        Self {
            response_body: false,
            ..Self::all()
        }
    }
}

enum SinkTarget {
    Writer(Mutex<Box<dyn Write + Send>>),
    Queue(SyncSender<Vec<u8>>),
}

/// Destination of dumped bytes.
///
/// Clones write to the same destination.
#[derive(Clone)]
pub struct DumpSink {
    target: Arc<SinkTarget>,
}

impl fmt::Debug for DumpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target.as_ref() {
            SinkTarget::Writer(_) => "writer",
            SinkTarget::Queue(_) => "queue",
        };
        f.debug_struct("DumpSink").field("target", &kind).finish()
    }
}

impl DumpSink {
    /// Sink writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::writer(io::stdout())
    }

    /// Sink writing to any writer.
    #[must_use]
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            target: Arc::new(SinkTarget::Writer(Mutex::new(Box::new(writer)))),
        }
    }

    /// Sink creating (or truncating) a file.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        File::create(path).map(Self::writer)
    }

    /// Returns `true` if writes are queued to a background thread.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.target.as_ref(), SinkTarget::Queue(_))
    }

    /// Move writes to a background thread draining a bounded queue.
    ///
    /// The sink is a blocking [`Write`], so the queue is drained by an OS
    /// thread instead of a runtime task. When the queue is full, chunks are
    /// dropped with a warning. The thread stops once every clone of the
    /// returned sink is dropped.
    #[must_use]
    pub fn into_async(self, capacity: usize) -> Self {
        if self.is_async() {
            return self;
        }
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(capacity.max(1));
        let drain = self.clone();
        let spawned = std::thread::Builder::new()
            .name("courier-dump".to_string())
            .spawn(move || {
                for chunk in rx {
                    drain.write(&chunk);
                }
            });

        match spawned {
            Ok(_) => Self {
                target: Arc::new(SinkTarget::Queue(tx)),
            },
            Err(err) => {
                tracing::warn!(target: "courier", %err, "cannot start dump thread, dumping synchronously");
                self
            }
        }
    }

    /// Write a chunk; failures are logged, never returned.
    pub fn write(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        match self.target.as_ref() {
            SinkTarget::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(err) = writer.write_all(chunk).and_then(|()| writer.flush()) {
                    tracing::warn!(target: "courier", %err, "dump write failed");
                }
            }
            SinkTarget::Queue(tx) => match tx.try_send(chunk.to_vec()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!(
                        target: "courier",
                        bytes = dropped.len(),
                        "dump queue full, dropping chunk"
                    );
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::warn!(target: "courier", "dump thread stopped, dropping chunk");
                }
            },
        }
    }
}

/// Dump tap installed on a transport.
#[derive(Debug, Clone)]
pub struct Dumper {
    options: DumpOptions,
    sink: DumpSink,
}

impl Dumper {
    /// Dump the selected parts to `sink`.
    #[must_use]
    pub const fn new(options: DumpOptions, sink: DumpSink) -> Self {
        Self { options, sink }
    }

    /// Selected parts.
    #[must_use]
    pub const fn options(&self) -> DumpOptions {
        self.options
    }

    /// Destination.
    #[must_use]
    pub const fn sink(&self) -> &DumpSink {
        &self.sink
    }

    /// Dump an outgoing request.
    pub fn dump_request(&self, request: &http::Request<Bytes>) {
        let mut out = Vec::new();
        if self.options.request_header {
            let target = request
                .uri()
                .path_and_query()
                .map_or("/", http::uri::PathAndQuery::as_str);
            out.extend_from_slice(
                format!("{} {target} {:?}\r\n", request.method(), request.version()).as_bytes(),
            );
            if !request.headers().contains_key(http::header::HOST)
                && let Some(authority) = request.uri().authority()
            {
                out.extend_from_slice(format!("host: {authority}\r\n").as_bytes());
            }
            write_headers(&mut out, request.headers());
        }
        if self.options.request_body && !request.body().is_empty() {
            out.extend_from_slice(request.body());
            out.extend_from_slice(b"\r\n\r\n");
        }
        self.sink.write(&out);
    }

    /// Dump the head of an incoming response and tap its body.
    #[must_use]
    pub fn tap_response(&self, response: http::Response<BodyStream>) -> http::Response<BodyStream> {
        if self.options.response_header {
            let mut out = Vec::new();
            out.extend_from_slice(
                format!("{:?} {}\r\n", response.version(), response.status()).as_bytes(),
            );
            write_headers(&mut out, response.headers());
            self.sink.write(&out);
        }
        if !self.options.response_body {
            return response;
        }

        let sink = self.sink.clone();
        response.map(move |body| -> BodyStream {
            Box::pin(body.map(move |chunk| {
                if let Ok(bytes) = &chunk {
                    sink.write(bytes);
                }
                chunk
            }))
        })
    }
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
        }
    }

    fn request() -> http::Request<Bytes> {
        http::Request::builder()
            .method("POST")
            .uri("http://api.test/users?page=2")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"name":"alice"}"#))
            .expect("request")
    }

    #[test]
    fn dumps_request_head_and_body() {
        let out = Shared::default();
        let dumper = Dumper::new(DumpOptions::all(), DumpSink::writer(out.clone()));

        dumper.dump_request(&request());

        insta::assert_snapshot!(out.text().replace("\r\n", "|"), @r#"POST /users?page=2 HTTP/1.1|host: api.test|content-type: application/json||{"name":"alice"}||"#);
    }

    #[test]
    fn header_only_skips_body() {
        let out = Shared::default();
        let dumper = Dumper::new(DumpOptions::only_header(), DumpSink::writer(out.clone()));

        dumper.dump_request(&request());

        let text = out.text();
        assert!(text.starts_with("POST /users?page=2 HTTP/1.1\r\n"));
        assert!(!text.contains("alice"));
    }

    #[tokio::test]
    async fn taps_response_body() {
        let out = Shared::default();
        let dumper = Dumper::new(DumpOptions::only_response(), DumpSink::writer(out.clone()));
        let response = http::Response::builder()
            .status(200)
            .header("content-type", "text/plain")
            .body(crate::full_body("pong"))
            .expect("response");

        let response = dumper.tap_response(response);
        let body = crate::collect_body(response.into_body()).await.expect("body");

        assert_eq!(body.as_ref(), b"pong");
        assert_eq!(
            out.text(),
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\n\r\npong"
        );
    }

    #[test]
    fn async_sink_drains_in_background() {
        let out = Shared::default();
        let sink = DumpSink::writer(out.clone()).into_async(8);
        assert!(sink.is_async());

        sink.write(b"queued");
        drop(sink);

        for _ in 0..100 {
            if out.text() == "queued" {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("dump thread did not drain the queue");
    }

    #[test]
    fn presets() {
        assert_eq!(DumpOptions::default(), DumpOptions::all());
        assert!(!DumpOptions::no_request_body().request_body);
        assert!(DumpOptions::no_request_body().response_body);
        assert!(!DumpOptions::only_body().response_header);
    }
}
