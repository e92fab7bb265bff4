//! Body encoding stage.

use std::mem;

use bytes::Bytes;
use courier_core::{ContentType, Error, Result, to_form};
use http::HeaderValue;
use http::header::CONTENT_TYPE;

use crate::client::ClientState;
use crate::request::RequestBody;
use crate::stage::RequestStage;
use crate::{Client, Request};

/// Encodes the request body and sets its `Content-Type`.
///
/// Methods that cannot carry a payload get none; GET may opt in through
/// the client. Otherwise the first matching source wins:
///
/// 1. a multipart form, with client and request form fields prepended as
///    text parts,
/// 2. request form fields (client fields underneath), urlencoded,
/// 3. a JSON or XML document, through the client codecs,
/// 4. raw bytes, with a sniffed content type,
/// 5. client form fields alone, when the request has no body at all.
///
/// An explicit `Content-Type` header is never replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeBody;

impl RequestStage for EncodeBody {
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        let state = client.state();
        if request
            .method
            .forbids_payload(state.allow_get_method_payload)
        {
            if !request.body.is_empty() || !request.form_data.is_empty() {
                tracing::debug!(method = %request.method, "dropping request body");
            }
            request.body = RequestBody::Empty;
            request.payload = Bytes::new();
            return Ok(());
        }

        let Some((content_type, payload)) = encode(state, request)? else {
            return Ok(());
        };
        if !request.headers.contains_key(CONTENT_TYPE) {
            let value = HeaderValue::from_str(&content_type)
                .map_err(|err| Error::invalid_header(format!("content-type: {err}")))?;
            request.headers.insert(CONTENT_TYPE, value);
        }
        request.payload = payload;
        Ok(())
    }
}

fn encode(state: &ClientState, request: &mut Request) -> Result<Option<(String, Bytes)>> {
    let encoded = match mem::take(&mut request.body) {
        RequestBody::Multipart(mut form) => {
            let fields = merged_form(&state.form_data, &request.form_data);
            form.prepend_text_fields(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            let (content_type, payload) = form.into_body();
            Some((content_type, payload))
        }
        _ if !request.form_data.is_empty() => {
            let fields = merged_form(&state.form_data, &request.form_data);
            Some((ContentType::FormUrlEncoded.to_string(), to_form(&fields)?))
        }
        RequestBody::Json(document) => Some((
            ContentType::Json.to_string(),
            state.json_marshal.marshal(&document)?,
        )),
        RequestBody::Xml(document) => Some((
            ContentType::Xml.to_string(),
            state.xml_marshal.marshal(&document)?,
        )),
        RequestBody::Bytes(bytes) => Some((ContentType::sniff(&bytes).to_string(), bytes)),
        RequestBody::Empty if !state.form_data.is_empty() => Some((
            ContentType::FormUrlEncoded.to_string(),
            to_form(&state.form_data)?,
        )),
        RequestBody::Empty => None,
    };
    Ok(encoded)
}

/// Client fields whose key the request does not set, then request fields.
fn merged_form<'a>(
    common: &'a [(String, String)],
    own: &'a [(String, String)],
) -> Vec<&'a (String, String)> {
    common
        .iter()
        .filter(|(key, _)| !own.iter().any(|(k, _)| k == key))
        .chain(own)
        .collect()
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use courier_core::{Form, Method};

    use super::*;

    fn encode_request(client: &Client, method: Method, request: Request) -> Request {
        let mut request = request;
        request.method = method;
        EncodeBody
            .before_request(client, &mut request)
            .expect("encode");
        request
    }

    #[test]
    fn get_drops_body_unless_allowed() {
        let mut client = Client::new();
        let request = encode_request(&client, Method::Get, client.r().set_body_string("x"));
        check!(request.payload().is_empty());
        check!(request.headers().get(CONTENT_TYPE).is_none());

        client.enable_allow_get_method_payload(true);
        let request = encode_request(&client, Method::Get, client.r().set_body_string("x"));
        check!(request.payload().as_ref() == b"x");

        let request = encode_request(&client, Method::Head, client.r().set_body_string("x"));
        check!(request.payload().is_empty());
    }

    #[test]
    fn json_body_and_explicit_content_type() {
        let client = Client::new();
        let request = encode_request(
            &client,
            Method::Post,
            client.r().set_body_json(&serde_json::json!({"a": 1})),
        );
        check!(request.payload().as_ref() == br#"{"a":1}"#);
        check!(request.headers()[CONTENT_TYPE] == "application/json; charset=utf-8");

        let request = encode_request(
            &client,
            Method::Post,
            client
                .r()
                .set_content_type("application/vnd.api+json")
                .set_body_json(&serde_json::json!({"a": 1})),
        );
        check!(request.headers()[CONTENT_TYPE] == "application/vnd.api+json");
    }

    #[test]
    fn form_fields_merge_with_request_first() {
        let mut client = Client::new();
        client.set_common_form_data([("lang", "en"), ("user", "client")]);

        let request = encode_request(
            &client,
            Method::Post,
            client.r().set_form_data([("user", "alice")]),
        );
        check!(request.payload().as_ref() == b"lang=en&user=alice");
        check!(request.headers()[CONTENT_TYPE] == "application/x-www-form-urlencoded");
    }

    #[test]
    fn client_form_alone_only_for_empty_body() {
        let mut client = Client::new();
        client.set_common_form_data([("lang", "en")]);

        let request = encode_request(&client, Method::Post, client.r());
        check!(request.payload().as_ref() == b"lang=en");

        let request = encode_request(&client, Method::Post, client.r().set_body_string("raw"));
        check!(request.payload().as_ref() == b"raw");
        check!(request.headers()[CONTENT_TYPE] == "text/plain; charset=utf-8");
    }

    #[test]
    fn multipart_gets_form_fields_first() {
        let mut client = Client::new();
        client.set_common_form_data([("token", "t")]);

        let form = Form::with_boundary("XyZ").file("upload", "a.txt", "hello");
        let request = encode_request(
            &client,
            Method::Post,
            client.r().add_form_data("note", "n").set_multipart(form),
        );

        let body = String::from_utf8_lossy(request.payload()).into_owned();
        let token = body.find("name=\"token\"").expect("token part");
        let note = body.find("name=\"note\"").expect("note part");
        let upload = body.find("name=\"upload\"").expect("upload part");
        check!(token < note);
        check!(note < upload);
        check!(request.headers()[CONTENT_TYPE] == "multipart/form-data; boundary=XyZ");
    }
}
