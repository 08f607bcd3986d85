//! End-to-end tests over a real listener

use gust_host::listener::{self, Listening};
use gust_host::{Method, Payload, Request, Response, RoutePayload, Server, ServerConfig};
use gust_qs::NestedQuery;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const FORM: &str = "application/x-www-form-urlencoded";

fn echo_query(req: &Request) -> Response {
    Response::json_value(&Value::Object(req.query.clone()))
}

fn echo_payload(req: &Request) -> Response {
    let value = match &req.payload {
        Payload::Empty => Value::Null,
        Payload::Structured(value) => value.clone(),
        Payload::Text(text) => Value::String(text.clone()),
        Payload::Buffer(bytes) => json!({ "buffer": bytes.len() }),
        Payload::Stream(stream) => json!({ "stream": stream.remaining(), "consumed": stream.consumed() }),
    };
    Response::json_value(&value)
}

async fn start(options: Value, strip_trailing_slash: bool) -> Listening {
    let config = ServerConfig::new()
        .hostname("127.0.0.1")
        .port(0)
        .strip_trailing_slash(strip_trailing_slash);
    let server = Arc::new(Server::new(config));
    server.register(&NestedQuery::new(), options).unwrap();

    server.route(Method::Get, "/", RoutePayload::parse(), echo_query).unwrap();
    server.route(Method::Get, "/test", RoutePayload::parse(), echo_query).unwrap();
    for method in [Method::Post, Method::Put, Method::Patch, Method::Delete] {
        server.route(method, "/", RoutePayload::parse(), echo_payload).unwrap();
    }
    server.route(Method::Post, "/upload", RoutePayload::stream(), echo_payload).unwrap();
    server.route(Method::Post, "/raw", RoutePayload::raw(), echo_payload).unwrap();

    listener::start(server).await.unwrap()
}

async fn send(
    addr: SocketAddr,
    method: Method,
    target: &str,
    content_type: Option<&str>,
    body: &str,
) -> (u16, Value) {
    let mut raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
    if let Some(content_type) = content_type {
        raw.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    raw.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status = response[9..12].parse().unwrap();
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    (status, serde_json::from_str(body).unwrap())
}

async fn get(addr: SocketAddr, target: &str) -> (u16, Value) {
    send(addr, Method::Get, target, None, "").await
}

#[tokio::test]
async fn test_query_parsed_with_and_without_trailing_slash() {
    for strip in [true, false] {
        let listening = start(Value::Null, strip).await;
        let target = if strip {
            "/test/?hello=world&unicorns%5B0%5D%5Bcolor%5D=blue"
        } else {
            "/test?hello=world&unicorns%5B0%5D%5Bcolor%5D=blue"
        };

        let (status, query) = get(listening.local_addr(), target).await;
        assert_eq!(status, 200);
        assert_eq!(query["hello"], "world");
        assert!(query["unicorns"].is_array());
        assert_eq!(query["unicorns"][0]["color"], "blue");

        listening.stop().await;
    }
}

#[tokio::test]
async fn test_query_uses_parser_options() {
    let listening = start(json!({ "parserOptions": { "parseArrays": false } }), false).await;

    let (_, query) = get(listening.local_addr(), "/?unicorns%5B0%5D%5Bcolor%5D=blue").await;
    assert!(query["unicorns"].is_object());
    assert_eq!(query["unicorns"]["0"]["color"], "blue");

    listening.stop().await;
}

#[tokio::test]
async fn test_query_parsing_disabled() {
    let listening = start(json!({ "queryString": false }), false).await;

    let (_, query) = get(listening.local_addr(), "/?a%5B0%5D%5Bb%5D=c").await;
    assert_eq!(query, json!({ "a[0][b]": "c" }));

    listening.stop().await;
}

#[tokio::test]
async fn test_no_query_string() {
    let listening = start(Value::Null, false).await;

    let (status, query) = get(listening.local_addr(), "/").await;
    assert_eq!(status, 200);
    assert_eq!(query, json!({}));

    listening.stop().await;
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let listening = start(Value::Null, false).await;

    let (status, body) = get(listening.local_addr(), "/?a=1&a%5Bb%5D=2").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Bad Request");

    listening.stop().await;
}

#[tokio::test]
async fn test_strict_query() {
    let listening = start(json!({ "parserOptions": { "strict": true } }), false).await;

    let (status, query) = get(listening.local_addr(), "/?a%5Bb%5D=c&d[e]=f").await;
    assert_eq!(status, 200);
    assert_eq!(query, json!({ "a[b]": "c", "d": { "e": "f" } }));

    let (status, _) = get(listening.local_addr(), "/?a[b=1").await;
    assert_eq!(status, 400);

    listening.stop().await;
}

#[tokio::test]
async fn test_form_payload_parsed_for_every_method() {
    let listening = start(Value::Null, false).await;

    for method in [Method::Post, Method::Put, Method::Patch, Method::Delete] {
        let (status, payload) = send(
            listening.local_addr(),
            method,
            "/",
            Some(FORM),
            "i=v%2Fr&unicorns%5B0%5D%5Bcolor%5D=blue",
        )
        .await;

        assert_eq!(status, 200, "{method}");
        assert_eq!(payload["i"], "v/r", "{method}");
        assert!(payload["unicorns"].is_array(), "{method}");
        assert_eq!(payload["unicorns"][0]["color"], "blue", "{method}");
    }

    listening.stop().await;
}

#[tokio::test]
async fn test_payload_uses_parser_options() {
    let listening = start(json!({ "qsOptions": { "parseArrays": false } }), false).await;

    let (_, payload) = send(
        listening.local_addr(),
        Method::Post,
        "/",
        Some(FORM),
        "unicorns%5B0%5D%5Bcolor%5D=blue",
    )
    .await;
    assert_eq!(payload, json!({ "unicorns": { "0": { "color": "blue" } } }));

    listening.stop().await;
}

#[tokio::test]
async fn test_payload_parsing_disabled() {
    let listening = start(json!({ "payload": false }), false).await;

    let (_, payload) = send(
        listening.local_addr(),
        Method::Post,
        "/",
        Some(FORM),
        "unicorns%5B0%5D%5Bcolor%5D=blue",
    )
    .await;
    assert_eq!(payload, json!({ "unicorns[0][color]": "blue" }));

    listening.stop().await;
}

#[tokio::test]
async fn test_json_payload_untouched() {
    let listening = start(Value::Null, false).await;

    let body = r#"{"simple":true,"unicorns[0][color]":"blue"}"#;
    let (_, payload) = send(listening.local_addr(), Method::Post, "/", Some("application/json"), body).await;
    assert_eq!(payload, json!({ "simple": true, "unicorns[0][color]": "blue" }));

    listening.stop().await;
}

#[tokio::test]
async fn test_no_payload() {
    let listening = start(Value::Null, false).await;

    let (status, payload) = send(listening.local_addr(), Method::Post, "/", Some(FORM), "").await;
    assert_eq!(status, 200);
    assert_eq!(payload, Value::Null);

    listening.stop().await;
}

#[tokio::test]
async fn test_stream_and_raw_payloads_untouched() {
    let listening = start(Value::Null, false).await;
    let body = "unicorns%5B0%5D%5Bcolor%5D=blue";

    let (_, payload) = send(listening.local_addr(), Method::Post, "/upload", Some(FORM), body).await;
    assert_eq!(payload, json!({ "stream": body.len(), "consumed": 0 }));

    let (_, payload) = send(listening.local_addr(), Method::Post, "/raw", Some(FORM), body).await;
    assert_eq!(payload, json!({ "buffer": body.len() }));

    listening.stop().await;
}

#[test]
fn test_unknown_option_aborts_registration() {
    let server = Server::default();
    let err = server
        .register(&NestedQuery::new(), json!({ "unicorns": true }))
        .unwrap_err();

    assert!(err.to_string().contains("unicorns"));
    assert!(server.plugins().is_empty());
}

#[test]
fn test_multipart_fields_parsed() {
    let server = Server::default();
    server.register(&NestedQuery::new(), Value::Null).unwrap();
    server.route(Method::Post, "/", RoutePayload::parse(), echo_payload).unwrap();

    // multipart decoding happens upstream of the host; fields arrive pre-buffered
    let req = gust_host::RequestBuilder::new(Method::Post, "/")
        .header("content-type", "multipart/form-data; boundary=----gust")
        .body("------gust--")
        .payload(Payload::Structured(json!({ "i": "v/r", "unicorns[0][color]": "blue" })))
        .build();

    let payload = server.inject(req).body_json().unwrap();
    assert_eq!(payload, json!({ "i": "v/r", "unicorns": [{ "color": "blue" }] }));
}
