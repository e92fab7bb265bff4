//! Pipeline behaviour checked through an in-process tower transport.

use std::sync::{Arc, Mutex, PoisonError};

use assert2::{check, let_assert};
use bytes::Bytes;
use courier::tower::service_fn;
use courier::{Client, Error, Request, Response, ServiceTransport, full_body};

#[derive(Debug, Clone)]
struct Seen {
    line: String,
    headers: http::HeaderMap,
    body: Bytes,
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Clone, Default)]
struct Wire(Arc<Mutex<Vec<Seen>>>);

impl Wire {
    fn requests(&self) -> Vec<Seen> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn last(&self) -> Seen {
        self.requests().pop().expect("a request reached the transport")
    }
}

/// Client whose transport answers `200 ok` and records what it was sent.
fn recording_client(log: &Log) -> (Client, Wire) {
    let wire = Wire::default();
    let recorded = wire.clone();
    let log = log.clone();
    let service = service_fn(move |request: http::Request<Bytes>| {
        let recorded = recorded.clone();
        let log = log.clone();
        async move {
            let line = format!("{} {}", request.method(), request.uri());
            log.push(format!("transport {line}"));
            let (parts, body) = request.into_parts();
            recorded
                .0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Seen {
                    line,
                    headers: parts.headers,
                    body,
                });
            Ok::<_, Error>(
                http::Response::builder()
                    .header("content-type", "text/plain")
                    .body(full_body("ok"))
                    .expect("response"),
            )
        }
    });

    let mut client = Client::new();
    client
        .set_base_url("http://api.test/v1")
        .set_transport(ServiceTransport::new(service));
    (client, wire)
}

#[tokio::test]
async fn stages_run_in_order() {
    let log = Log::default();
    let (mut client, _wire) = recording_client(&log);

    let first = log.clone();
    let second = log.clone();
    let after = log.clone();
    client
        .set_common_query_param("page", "1")
        .on_before_request(move |_client: &Client, request: &mut Request| {
            first.push(format!("before first, resolved: {}", request.url().is_some()));
            Ok(())
        })
        .on_before_request(move |_client: &Client, _request: &mut Request| {
            second.push("before second");
            Ok(())
        })
        .on_after_response(move |_client: &Client, response: &mut Response| {
            after.push(format!("after, buffered: {}", response.is_buffered()));
            Ok(())
        });

    client.r().get("/items").await.expect("response");

    insta::assert_snapshot!(log.events().join("\n"), @r"
    before first, resolved: false
    before second
    transport GET http://api.test/v1/items?page=1
    after, buffered: true
    ");
}

#[tokio::test]
async fn failing_request_stage_stops_the_call() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);

    let later = log.clone();
    client
        .on_before_request(|_client: &Client, _request: &mut Request| {
            Err(Error::stage("missing credentials"))
        })
        .on_before_request(move |_client: &Client, _request: &mut Request| {
            later.push("second stage");
            Ok(())
        });

    let err = client.r().get("/items").await.expect_err("stage error");
    let_assert!(Error::Stage(message) = err);
    check!(message == "missing credentials");
    check!(log.events().is_empty());
    check!(wire.requests().is_empty());
}

#[tokio::test]
async fn failing_response_stage_fails_the_call() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);
    client.on_after_response(|_client: &Client, response: &mut Response| {
        if response.header("x-signature").is_none() {
            return Err(Error::stage("unsigned response"));
        }
        Ok(())
    });

    let err = client.r().get("/items").await.expect_err("stage error");
    check!(err.to_string().contains("unsigned response"));
    check!(wire.requests().len() == 1);
}

#[tokio::test]
async fn request_stage_can_rewrite_the_request() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);
    client.on_before_request(|_client: &Client, request: &mut Request| {
        request
            .headers_mut()
            .insert("x-request-id", http::HeaderValue::from_static("42"));
        request.set_method(courier::Method::Put);
        Ok(())
    });

    client.r().get("/items/7").await.expect("response");

    let seen = wire.last();
    check!(seen.line == "PUT http://api.test/v1/items/7");
    check!(seen.headers.get("x-request-id").map(|v| v.as_bytes()) == Some(&b"42"[..]));
}

#[tokio::test]
async fn clones_are_isolated() {
    let log = Log::default();
    let (mut original, wire) = recording_client(&log);
    original.set_common_header("X-A", "1");

    let mut copy = original.clone();
    copy.set_common_header("X-B", "2").set_base_url("http://other.test");
    original.set_common_header("X-C", "3");

    original.r().get("/one").await.expect("original");
    copy.r().get("/two").await.expect("copy");

    let requests = wire.requests();
    let_assert!([from_original, from_copy] = requests.as_slice());

    check!(from_original.line == "GET http://api.test/v1/one");
    check!(from_original.headers.contains_key("x-a"));
    check!(!from_original.headers.contains_key("x-b"));
    check!(from_original.headers.contains_key("x-c"));

    check!(from_copy.line == "GET http://other.test/two");
    check!(from_copy.headers.contains_key("x-a"));
    check!(from_copy.headers.contains_key("x-b"));
    check!(!from_copy.headers.contains_key("x-c"));
}

#[tokio::test]
async fn requests_keep_the_settings_they_were_created_with() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);

    let early = client.r();
    client.set_common_header("X-Late", "1");
    early.get("/items").await.expect("response");

    check!(!wire.last().headers.contains_key("x-late"));
}

#[tokio::test]
async fn get_payload_is_opt_in() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);

    client.r().set_body_string("filter").get("/search").await.expect("get");
    let seen = wire.last();
    check!(seen.body.is_empty());
    check!(!seen.headers.contains_key("content-type"));

    client.enable_allow_get_method_payload(true);
    client.r().set_body_string("filter").get("/search").await.expect("get");
    check!(wire.last().body.as_ref() == b"filter");
}

#[tokio::test]
async fn head_and_options_never_carry_a_payload() {
    let log = Log::default();
    let (mut client, wire) = recording_client(&log);
    client.enable_allow_get_method_payload(true);

    client.r().set_body_string("x").head("/items").await.expect("head");
    check!(wire.last().body.is_empty());

    client.r().set_body_string("x").options("/items").await.expect("options");
    check!(wire.last().body.is_empty());

    client.r().set_body_string("x").delete("/items").await.expect("delete");
    check!(wire.last().body.as_ref() == b"x");
}

#[tokio::test]
async fn deferred_request_errors_surface_on_send() {
    let log = Log::default();
    let (client, wire) = recording_client(&log);

    let err = client
        .r()
        .set_header("bad header", "value")
        .get("/items")
        .await
        .expect_err("invalid header");
    check!(matches!(err, Error::InvalidHeader(_)));
    check!(wire.requests().is_empty());
}

#[tokio::test]
async fn unread_bodies_are_still_decoded() {
    let gbk = service_fn(|_request: http::Request<Bytes>| async {
        let (body, _, _) = encoding_rs::GBK.encode("你好");
        Ok::<_, Error>(
            http::Response::builder()
                .header("content-type", "text/plain; charset=gbk")
                .body(full_body(body.into_owned()))
                .expect("response"),
        )
    });
    let mut client = Client::new();
    client
        .set_base_url("http://api.test")
        .set_transport(ServiceTransport::new(gbk));

    let mut response = client.r().get("/greeting").await.expect("auto-read");
    check!(response.text().await.expect("text") == "你好");

    client.disable_auto_read_response();
    let mut response = client.r().get("/greeting").await.expect("no auto-read");
    check!(!response.is_buffered());
    check!(response.text().await.expect("text") == "你好");
}
