//! Package-level helpers backed by the replaceable default client.

use std::sync::Arc;

use assert2::check;
use bytes::Bytes;
use courier::tower::service_fn;
use courier::{Client, Error, ServiceTransport, full_body};

#[tokio::test]
async fn helpers_use_the_installed_default_client() {
    let before = courier::default_client();
    check!(before.timeout() == courier::DEFAULT_TIMEOUT);

    let echo = service_fn(|request: http::Request<Bytes>| async move {
        let line = format!("{} {}", request.method(), request.uri());
        Ok::<_, Error>(http::Response::new(full_body(line)))
    });
    let mut client = Client::new();
    client
        .set_base_url("http://default.test")
        .set_common_header("X-Default", "yes")
        .set_transport(ServiceTransport::new(echo));
    courier::set_default_client(client);

    let installed = courier::default_client();
    check!(!Arc::ptr_eq(&before, &installed));
    check!(installed.base_url() == "http://default.test");

    let mut response = courier::get("/ping").await.expect("get");
    check!(response.text().await.expect("text") == "GET http://default.test/ping");

    let mut response = courier::delete("/items/1").await.expect("delete");
    check!(response.text().await.expect("text") == "DELETE http://default.test/items/1");

    let request = courier::r().set_query_param("q", "x");
    check!(request.headers().is_empty());
    let mut response = request.post("/search").await.expect("post");
    check!(response.text().await.expect("text") == "POST http://default.test/search?q=x");
}
