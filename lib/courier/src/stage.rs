//! Pipeline stage contracts.
//!
//! A call runs every user [`RequestStage`] in registration order, then the
//! built-in request stages (URL resolution, header and cookie merge, body
//! encoding, trace attachment). After dispatch, the built-in response stages
//! (auto-read, auto-decode, download) run before every user
//! [`ResponseStage`]. The first stage returning an error ends the call.

use std::future::Future;
use std::pin::Pin;

use courier_core::Result;

use crate::{Client, Request, Response};

/// Future returned by [`ResponseStage::after_response`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Transforms a request before it is dispatched.
///
/// Implemented for closures:
///
/// ```ignore
/// client.on_before_request(|_client: &Client, request: &mut Request| {
///     request.headers_mut().insert("x-request-id", HeaderValue::from_static("42"));
///     Ok(())
/// });
/// ```
pub trait RequestStage: Send + Sync {
    /// Apply the stage.
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> RequestStage for F
where
    F: Fn(&Client, &mut Request) -> Result<()> + Send + Sync,
{
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        self(client, request)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Transforms a response once the transport returned it.
///
/// Closures implementing `Fn(&Client, &mut Response) -> Result<()>` are
/// accepted directly; implement the trait for stages that need to await
/// (reading the body, writing it somewhere).
pub trait ResponseStage: Send + Sync {
    /// Apply the stage.
    fn after_response<'a>(
        &'a self,
        client: &'a Client,
        response: &'a mut Response,
    ) -> StageFuture<'a>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> ResponseStage for F
where
    F: Fn(&Client, &mut Response) -> Result<()> + Send + Sync,
{
    fn after_response<'a>(
        &'a self,
        client: &'a Client,
        response: &'a mut Response,
    ) -> StageFuture<'a> {
        let result = self(client, response);
        Box::pin(std::future::ready(result))
    }

    fn name(&self) -> &str {
        "closure"
    }
}
