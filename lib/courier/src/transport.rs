//! Default transport using hyper-util.

use std::fmt;
use std::sync::OnceLock;
use std::task::{Context, Poll};

use bytes::Bytes;
use courier_core::{
    BodyStream, Dumper, Error, Result, Trace, Transport, TransportConfig, TransportFuture,
};
use futures_util::TryStreamExt;
use http::HeaderValue;
use http::header::{ACCEPT_ENCODING, CONNECTION};
use http_body_util::{BodyStream as HyperBodyStream, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower_service::Service;

use crate::connector::{CourierConnector, https_connector};
use crate::decompression::{self, decompress_response};

type Pool = Client<CourierConnector, Full<Bytes>>;

/// Transport backed by a pooled hyper-util client over rustls.
///
/// The connection pool is built on first use from the current
/// [`TransportConfig`]; changing the configuration drops the pool so the
/// next exchange opens connections with the new settings.
pub struct HyperTransport {
    config: TransportConfig,
    dumper: Option<Dumper>,
    pool: OnceLock<Pool>,
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .field("dumper", &self.dumper)
            .field("connected", &self.pool.get().is_some())
            .finish()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            dumper: None,
            pool: OnceLock::new(),
        }
    }

    fn pool(&self) -> Result<Pool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool.clone());
        }

        let connector = https_connector(&self.config)?;
        let idle_per_host = if self.config.disable_keep_alives {
            0
        } else {
            self.config.pool_idle_per_host
        };
        let pool = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(self.config.pool_idle_timeout)
            .pool_max_idle_per_host(idle_per_host)
            .build(connector);

        // A concurrent first call may have won the race, both pools are equivalent
        Ok(self.pool.get_or_init(|| pool).clone())
    }

    fn prepare(&self, request: &mut http::Request<Bytes>) -> bool {
        let mut decompress = false;
        if !self.config.disable_compression
            && request.method() != http::Method::HEAD
            && !request.headers().contains_key(ACCEPT_ENCODING)
        {
            request.headers_mut().insert(
                ACCEPT_ENCODING,
                HeaderValue::from_static(decompression::ACCEPT_ENCODING),
            );
            decompress = true;
        }
        if self.config.disable_keep_alives {
            request
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
        }
        decompress
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = error_chain(&err);
        let lower = msg.to_ascii_lowercase();

        if lower.contains("ssl") || lower.contains("tls") || lower.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

impl Transport for HyperTransport {
    fn round_trip(&self, mut request: http::Request<Bytes>) -> TransportFuture {
        let pool = self.pool();
        let decompress = self.prepare(&mut request);
        let dumper = self.dumper.clone();

        Box::pin(async move {
            let pool = pool?;
            if let Some(dumper) = &dumper {
                dumper.dump_request(&request);
            }

            let trace = request.extensions().get::<Trace>().cloned();
            if let Some(trace) = &trace {
                trace.record_request_sent();
            }
            let response = pool
                .request(request.map(Full::new))
                .await
                .map_err(Self::map_hyper_error)?;
            if let Some(trace) = &trace {
                trace.record_first_byte();
            }

            let response = response.map(|body| -> BodyStream {
                Box::pin(
                    HyperBodyStream::new(body)
                        .map_ok(|frame| frame.into_data().unwrap_or_default())
                        .map_err(|e| Error::connection(e.to_string())),
                )
            });
            let response = match &dumper {
                Some(dumper) => dumper.tap_response(response),
                None => response,
            };

            Ok(if decompress {
                decompress_response(response)
            } else {
                response
            })
        })
    }

    fn clone_transport(&self) -> Box<dyn Transport> {
        Box::new(Self {
            config: self.config.clone(),
            dumper: self.dumper.clone(),
            pool: OnceLock::new(),
        })
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut TransportConfig {
        self.pool = OnceLock::new();
        &mut self.config
    }

    fn set_dumper(&mut self, dumper: Option<Dumper>) {
        self.dumper = dumper;
    }

    fn dumper(&self) -> Option<&Dumper> {
        self.dumper.as_ref()
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<http::Request<Bytes>> for HyperTransport {
    type Response = http::Response<BodyStream>;
    type Error = Error;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // The pool applies its own back-pressure per connection
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future {
        self.round_trip(request)
    }
}
