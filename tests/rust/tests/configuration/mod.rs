//! Configuration resolution and enablement at server startup

use accesslog_core::{ResourceLocation, BUILTIN_CONFIG_NAME};
use pretty_assertions::assert_eq;
use tests::fixtures;
use tests::{init_test_tracing, AccessLogError, AccessLogSettings, TestServer};

const QUEUE_CONFIG: &str = r#"{ "appenders": ["queue"] }"#;
const QUEUE_WITHOUT_JSON: &str = r#"{
    "appenders": ["queue"],
    "sections": [{ "path_prefix": "/json", "enabled": false }]
}"#;

fn settings_in(root: &tempfile::TempDir) -> AccessLogSettings {
    init_test_tracing();
    AccessLogSettings::default().with_resource_roots(vec![root.path().to_path_buf()])
}

async fn logged_uris(server: &TestServer) -> Vec<String> {
    for path in ["/text", "/json"] {
        server.get(path).await.bytes().await.unwrap();
    }
    server
        .queue()
        .drain()
        .into_iter()
        .map(|event| event.request_uri)
        .collect()
}

#[tokio::test]
async fn test_test_config_preferred_over_main_config() {
    let root = fixtures::resource_root();
    fixtures::write_config(root.path(), "accesslog-test.json", QUEUE_CONFIG);
    fixtures::write_config(root.path(), "accesslog.json", QUEUE_WITHOUT_JSON);

    let server = TestServer::start(settings_in(&root)).await.unwrap();
    let access_log = server.access_log().expect("access log enabled");
    assert_eq!(access_log.source(), "classpath:accesslog-test.json");
    assert_eq!(logged_uris(&server).await, vec!["/text", "/json"]);
}

#[tokio::test]
async fn test_main_config_when_no_test_config() {
    let root = fixtures::resource_root();
    fixtures::write_config(root.path(), "accesslog.json", QUEUE_WITHOUT_JSON);

    let server = TestServer::start(settings_in(&root)).await.unwrap();
    assert_eq!(server.access_log().unwrap().source(), "classpath:accesslog.json");
    assert_eq!(logged_uris(&server).await, vec!["/text"]);
}

#[tokio::test]
async fn test_builtin_config_when_no_files() {
    let root = fixtures::resource_root();

    let server = TestServer::start(settings_in(&root)).await.unwrap();
    assert_eq!(
        server.access_log().unwrap().source(),
        ResourceLocation::Builtin.to_string()
    );
    assert!(server.access_log().unwrap().source().ends_with(BUILTIN_CONFIG_NAME));

    // The bundled configuration only writes to the console
    let response = server.get("/text").await;
    assert_eq!(response.status(), 200);
    assert!(server.queue().is_empty());
}

#[tokio::test]
async fn test_later_roots_searched_after_earlier_ones() {
    let first = fixtures::resource_root();
    let second = fixtures::resource_root();
    fixtures::write_config(second.path(), "accesslog.json", QUEUE_WITHOUT_JSON);
    fixtures::write_config(first.path(), "accesslog.json", QUEUE_CONFIG);

    let settings = AccessLogSettings::default()
        .with_resource_roots(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    let server = TestServer::start(settings).await.unwrap();
    assert_eq!(logged_uris(&server).await, vec!["/text", "/json"]);
}

#[tokio::test]
async fn test_explicit_config_used_over_fallbacks() {
    let root = fixtures::resource_root();
    fixtures::write_config(root.path(), "accesslog-test.json", QUEUE_CONFIG);
    let explicit = fixtures::write_config(root.path(), "custom.json", QUEUE_WITHOUT_JSON);
    let location = explicit.to_string_lossy().to_string();

    let server = TestServer::start(settings_in(&root).with_config(location.clone()))
        .await
        .unwrap();
    assert_eq!(server.access_log().unwrap().source(), location);
    assert_eq!(logged_uris(&server).await, vec!["/text"]);
}

#[tokio::test]
async fn test_explicit_classpath_config() {
    let server = TestServer::start(fixtures::settings_with_config("filtering.json"))
        .await
        .unwrap();
    assert_eq!(server.access_log().unwrap().source(), "classpath:filtering.json");
}

#[tokio::test]
async fn test_explicit_missing_config_fails_startup() {
    let root = fixtures::resource_root();
    fixtures::write_config(root.path(), "accesslog-test.json", QUEUE_CONFIG);
    let missing = root.path().join("missing.json").to_string_lossy().to_string();

    let err = TestServer::start(settings_in(&root).with_config(missing.clone()))
        .await
        .err()
        .expect("startup must fail");
    match err {
        AccessLogError::ConfigurationNotFound { location } => assert_eq!(location, missing),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_invalid_config_fails_startup() {
    let root = fixtures::resource_root();
    fixtures::write_config(root.path(), "accesslog.json", r#"{ "appenders": "queue" "#);

    let err = TestServer::start(settings_in(&root)).await.err().unwrap();
    assert!(matches!(err, AccessLogError::InvalidConfiguration { .. }));
}

#[tokio::test]
async fn test_disabled_by_settings() {
    let mut settings = fixtures::settings();
    settings.enabled = false;

    let server = TestServer::start(settings).await.unwrap();
    assert!(server.access_log().is_none());

    let response = server.get("/text").await;
    assert_eq!(response.status(), 200);
    assert!(server.queue().is_empty());
}

#[tokio::test]
async fn test_disabled_by_configuration() {
    let server = TestServer::start(fixtures::settings_with_config("disabled.json"))
        .await
        .unwrap();
    assert!(server.access_log().is_none());

    server.get("/text").await.bytes().await.unwrap();
    assert!(server.queue().is_empty());
}

#[tokio::test]
async fn test_settings_from_environment_lookup() {
    let vars = [
        ("ACCESSLOG_CONFIG", "classpath:prod-only.json"),
        ("ACCESSLOG_PROFILES", "prod"),
        ("ACCESSLOG_INTEGRATION", "forwarded"),
    ];
    let settings = AccessLogSettings::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .with_resource_roots(vec![fixtures::resources_dir()]);

    let server = TestServer::start(settings).await.unwrap();
    let access_log = server.access_log().unwrap();
    assert_eq!(access_log.source(), "classpath:prod-only.json");
    assert!(access_log.profiles().contains("prod"));

    server
        .client()
        .get(server.url("/text"))
        .header("X-Forwarded-For", "198.51.100.4")
        .send()
        .await
        .unwrap();
    let event = server.queue().pop().expect("prod requests are logged");
    assert_eq!(event.remote_addr, "198.51.100.4");
}
