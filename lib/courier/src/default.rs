//! Process-wide default client.
//!
//! The helpers forward to the current default client and never change it.
//! [`set_default_client`] swaps the whole client at once; calls already
//! built keep the client they were built with.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use courier_core::Result;

use crate::{Client, Request, Response};

static DEFAULT_CLIENT: LazyLock<RwLock<Arc<Client>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Client::new())));

/// Current default client.
#[must_use]
pub fn default_client() -> Arc<Client> {
    Arc::clone(&DEFAULT_CLIENT.read().unwrap_or_else(PoisonError::into_inner))
}

/// Replace the default client.
pub fn set_default_client(client: Client) {
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Arc::new(client);
}

/// Start a request on the default client.
pub fn r() -> Request {
    default_client().r()
}

/// Alias of [`r`].
pub fn new_request() -> Request {
    r()
}

/// GET `url` with the default client.
pub async fn get(url: impl AsRef<str>) -> Result<Response> {
    r().get(url).await
}

/// POST to `url` with the default client.
pub async fn post(url: impl AsRef<str>) -> Result<Response> {
    r().post(url).await
}

/// PUT to `url` with the default client.
pub async fn put(url: impl AsRef<str>) -> Result<Response> {
    r().put(url).await
}

/// PATCH `url` with the default client.
pub async fn patch(url: impl AsRef<str>) -> Result<Response> {
    r().patch(url).await
}

/// DELETE `url` with the default client.
pub async fn delete(url: impl AsRef<str>) -> Result<Response> {
    r().delete(url).await
}

/// HEAD `url` with the default client.
pub async fn head(url: impl AsRef<str>) -> Result<Response> {
    r().head(url).await
}

/// OPTIONS `url` with the default client.
pub async fn options(url: impl AsRef<str>) -> Result<Response> {
    r().options(url).await
}
