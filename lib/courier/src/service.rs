//! Transport adapter for tower services.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use courier_core::{
    BodyStream, Dumper, Error, Trace, Transport, TransportConfig, TransportFuture,
};
use tower::ServiceExt;
use tower_service::Service;

/// Transport delegating every exchange to a tower [`Service`].
///
/// This is how retries, rate limits or in-process test doubles are composed
/// under a client: build the stack with `tower::ServiceBuilder` and hand the
/// result to [`Client::set_transport`](crate::Client::set_transport).
///
/// The service is kept behind a mutex so the transport is `Sync`; each call
/// locks it only long enough to clone it, then drives the clone.
///
/// # Example
///
/// ```ignore
/// use courier::{ServiceTransport, full_body};
///
/// let transport = ServiceTransport::new(tower::service_fn(|_req| async {
///     Ok(http::Response::new(full_body("pong")))
/// }));
/// ```
pub struct ServiceTransport<S> {
    service: Arc<Mutex<S>>,
    config: TransportConfig,
    dumper: Option<Dumper>,
}

impl<S> fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTransport")
            .field("config", &self.config)
            .field("dumper", &self.dumper)
            .finish_non_exhaustive()
    }
}

impl<S> ServiceTransport<S> {
    /// Wrap a service.
    #[must_use]
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            config: TransportConfig::default(),
            dumper: None,
        }
    }
}

impl<S> ServiceTransport<S>
where
    S: Clone,
{
    fn service(&self) -> S {
        // Lock, clone the service, and release the lock immediately
        self.service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<S> Transport for ServiceTransport<S>
where
    S: Service<http::Request<Bytes>, Response = http::Response<BodyStream>, Error = Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    fn round_trip(&self, request: http::Request<Bytes>) -> TransportFuture {
        let service = self.service();
        let dumper = self.dumper.clone();

        Box::pin(async move {
            if let Some(dumper) = &dumper {
                dumper.dump_request(&request);
            }
            let trace = request.extensions().get::<Trace>().cloned();
            if let Some(trace) = &trace {
                trace.record_request_sent();
            }

            let response = service.oneshot(request).await?;

            if let Some(trace) = &trace {
                trace.record_first_byte();
            }
            Ok(match &dumper {
                Some(dumper) => dumper.tap_response(response),
                None => response,
            })
        })
    }

    fn clone_transport(&self) -> Box<dyn Transport> {
        Box::new(Self {
            service: Arc::new(Mutex::new(self.service())),
            config: self.config.clone(),
            dumper: self.dumper.clone(),
        })
    }

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut TransportConfig {
        &mut self.config
    }

    fn set_dumper(&mut self, dumper: Option<Dumper>) {
        self.dumper = dumper;
    }

    fn dumper(&self) -> Option<&Dumper> {
        self.dumper.as_ref()
    }
}
