//! Access event attributes as seen through a running server
//!
//! Every scenario runs once per server integration strategy.

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tests::fixtures;
use tests::server::{EVENT_CHUNK, JSON_BODY, TEXT_BODY};
use tests::{init_test_tracing, ServerIntegration, TestServer};

async fn start(integration: ServerIntegration) -> TestServer {
    init_test_tracing();
    TestServer::start(fixtures::settings().with_integration(integration))
        .await
        .expect("start test server")
}

async fn basic_attributes(integration: ServerIntegration) {
    let server = start(integration).await;

    let before = Utc::now();
    let response = server.get("/text").await;
    let after = Utc::now();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), TEXT_BODY);

    let event = server.queue().pop().expect("one access event");
    assert!(server.queue().is_empty());

    assert!(event.timestamp >= before && event.timestamp <= after);
    assert_eq!(event.server_name, "localhost");
    assert_eq!(event.local_port, server.port());
    assert_eq!(event.protocol, "HTTP/1.1");
    assert_eq!(event.method, "GET");
    assert_eq!(event.request_uri, "/text");
    assert_eq!(event.query_string, "");
    assert_eq!(event.request_url, "GET /text HTTP/1.1");
    assert_eq!(event.remote_addr, "127.0.0.1");
    assert_eq!(event.remote_host, "127.0.0.1");
    assert_eq!(event.remote_user, None);
    assert_eq!(event.status_code, 200);
    assert_eq!(event.content_length, TEXT_BODY.len() as u64);
    assert!(event.elapsed_ms < 10_000);
    assert!(!event.thread_name.is_empty());
}

async fn query_string(integration: ServerIntegration) {
    let server = start(integration).await;

    let response = server.get("/text?query").await;
    assert_eq!(response.status(), 200);

    let event = server.queue().pop().expect("one access event");
    assert_eq!(event.request_uri, "/text");
    assert_eq!(event.query_string, "?query");
    assert_eq!(event.request_url, "GET /text?query HTTP/1.1");
}

async fn content_length_with_header(integration: ServerIntegration) {
    let server = start(integration).await;

    let response = server.get("/text").await;
    assert_eq!(response.content_length(), Some(TEXT_BODY.len() as u64));
    response.text().await.unwrap();

    let event = server.queue().pop().expect("one access event");
    assert_eq!(event.content_length, TEXT_BODY.len() as u64);
}

async fn content_length_without_header(integration: ServerIntegration) {
    let server = start(integration).await;

    let response = server.get("/json").await;
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("content-length").is_none());
    assert_eq!(response.text().await.unwrap(), JSON_BODY);

    let event = server.queue().pop().expect("one access event");
    assert_eq!(event.request_uri, "/json");
    assert_eq!(event.content_length, JSON_BODY.len() as u64);
}

async fn unmatched_route(integration: ServerIntegration) {
    let server = start(integration).await;

    let response = server.get("/missing").await;
    assert_eq!(response.status(), 404);

    let event = server.queue().pop().expect("one access event");
    assert_eq!(event.request_uri, "/missing");
    assert_eq!(event.status_code, 404);
}

#[tokio::test]
async fn test_basic_attributes_direct() {
    basic_attributes(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_basic_attributes_forwarded() {
    basic_attributes(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_query_string_direct() {
    query_string(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_query_string_forwarded() {
    query_string(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_content_length_with_header_direct() {
    content_length_with_header(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_content_length_with_header_forwarded() {
    content_length_with_header(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_content_length_without_header_direct() {
    content_length_without_header(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_content_length_without_header_forwarded() {
    content_length_without_header(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_unmatched_route_direct() {
    unmatched_route(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_unmatched_route_forwarded() {
    unmatched_route(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_one_event_per_request() {
    let server = start(ServerIntegration::Direct).await;

    for path in ["/text", "/json", "/text?again"] {
        server.get(path).await.bytes().await.unwrap();
    }

    let uris: Vec<String> = server
        .queue()
        .drain()
        .into_iter()
        .map(|e| e.request_uri)
        .collect();
    assert_eq!(uris, vec!["/text", "/json", "/text"]);
}

#[tokio::test]
async fn test_forwarded_headers_only_trusted_when_forwarded() {
    for (integration, expected_addr, expected_host) in [
        (ServerIntegration::Direct, "127.0.0.1", "localhost"),
        (ServerIntegration::Forwarded, "203.0.113.9", "app.example.com"),
    ] {
        let server = start(integration).await;

        server
            .client()
            .get(server.url("/text"))
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .header("X-Forwarded-Host", "app.example.com")
            .send()
            .await
            .unwrap();

        let event = server.queue().pop().expect("one access event");
        assert_eq!(event.remote_addr, expected_addr, "{:?}", integration);
        assert_eq!(event.server_name, expected_host, "{:?}", integration);
    }
}

#[tokio::test]
async fn test_remote_user_from_basic_auth() {
    let server = start(ServerIntegration::Direct).await;

    server
        .client()
        .get(server.url("/text"))
        .basic_auth("alice", Some("secret"))
        .send()
        .await
        .unwrap();

    let event = server.queue().pop().expect("one access event");
    assert_eq!(event.remote_user.as_deref(), Some("alice"));
}

async fn open_stream_delivered(integration: ServerIntegration) {
    let server = start(integration).await;

    let mut response = tokio::time::timeout(Duration::from_secs(5), server.get("/events"))
        .await
        .expect("response head arrives while the stream is open");
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("content-length").is_none());

    let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
        .await
        .expect("first chunk arrives while the stream is open")
        .unwrap()
        .expect("a chunk");
    assert_eq!(&chunk[..], EVENT_CHUNK.as_bytes());

    // The response has not completed, so there is nothing to log yet
    assert!(server.queue().is_empty());
}

#[tokio::test]
async fn test_open_stream_delivered_direct() {
    open_stream_delivered(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_open_stream_delivered_forwarded() {
    open_stream_delivered(ServerIntegration::Forwarded).await;
}
