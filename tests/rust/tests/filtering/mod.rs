//! Enable/disable rules applied to live requests

use pretty_assertions::assert_eq;
use tests::fixtures;
use tests::{init_test_tracing, AccessLogSettings, ProfileSet, ServerIntegration, TestServer};

async fn start(settings: AccessLogSettings) -> TestServer {
    init_test_tracing();
    TestServer::start(settings).await.expect("start test server")
}

async fn request_uris(server: &TestServer, paths: &[&str]) -> Vec<String> {
    for path in paths {
        let response = server.get(path).await;
        assert!(response.status().is_success() || response.status() == 404);
        response.bytes().await.unwrap();
    }
    server
        .queue()
        .drain()
        .into_iter()
        .map(|event| event.request_uri)
        .collect()
}

async fn path_rule_skips_matching_requests(integration: ServerIntegration) {
    let server = start(fixtures::settings_with_config("filtering.json").with_integration(integration)).await;

    let uris = request_uris(&server, &["/text", "/json", "/json?x=1", "/text"]).await;
    assert_eq!(uris, vec!["/text", "/text"]);
}

#[tokio::test]
async fn test_path_rule_direct() {
    path_rule_skips_matching_requests(ServerIntegration::Direct).await;
}

#[tokio::test]
async fn test_path_rule_forwarded() {
    path_rule_skips_matching_requests(ServerIntegration::Forwarded).await;
}

#[tokio::test]
async fn test_skipped_requests_still_served() {
    let server = start(fixtures::settings_with_config("filtering.json")).await;

    let response = server.get("/json").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), tests::server::JSON_BODY);
    assert!(server.queue().is_empty());
}

#[tokio::test]
async fn test_profile_rule_silences_everything() {
    let settings = fixtures::settings_with_config("filtering.json")
        .with_profiles(ProfileSet::from_list("quiet"));
    let server = start(settings).await;

    let uris = request_uris(&server, &["/text", "/json"]).await;
    assert!(uris.is_empty());
}

#[tokio::test]
async fn test_default_skip_with_allow_rule() {
    let server = start(fixtures::settings_with_config("allowlist.json")).await;

    let uris = request_uris(&server, &["/json", "/text", "/missing"]).await;
    assert_eq!(uris, vec!["/text"]);
}

#[tokio::test]
async fn test_only_prod_rule() {
    let dev = start(
        fixtures::settings_with_config("prod-only.json").with_profiles(ProfileSet::from_list("dev")),
    )
    .await;
    assert!(request_uris(&dev, &["/text"]).await.is_empty());

    let prod = start(
        fixtures::settings_with_config("prod-only.json").with_profiles(ProfileSet::from_list("prod")),
    )
    .await;
    assert_eq!(request_uris(&prod, &["/text"]).await, vec!["/text"]);
}

#[tokio::test]
async fn test_malformed_rule_fails_open() {
    let settings = fixtures::settings_with_config("malformed.json")
        .with_profiles(ProfileSet::from_list("dev,prod"));
    let server = start(settings).await;

    assert_eq!(request_uris(&server, &["/text"]).await, vec!["/text"]);
}

#[tokio::test]
async fn test_default_configuration_logs_everything() {
    let server = start(fixtures::settings()).await;

    let uris = request_uris(&server, &["/text", "/json", "/missing"]).await;
    assert_eq!(uris, vec!["/text", "/json", "/missing"]);
}
