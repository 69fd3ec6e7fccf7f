// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP collaborators against a wiremock server.

use std::sync::Arc;

use plugind_config::PlugindConfig;
use plugind_config::model::{ConfdConfig, MarketConfig};
use plugind_core::{Catalog, PlatformInfo, PlugindError};
use plugind_plugin::{ConfdClient, MarketClient, MarketDb, PluginDb, WazoVersionFinder};
use serial_test::serial;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog_body() -> serde_json::Value {
    serde_json::json!({
        "items": [
            {
                "namespace": "official",
                "name": "admin-ui",
                "display_name": "Admin UI",
                "versions": [
                    {"version": "1.0", "options": {"url": "https://git.example.com/admin-ui", "ref": "v1.0"}},
                    {"version": "1.1", "options": {"url": "https://git.example.com/admin-ui", "ref": "v1.1"}}
                ]
            }
        ],
        "total": 1
    })
}

fn market_client(server: &MockServer) -> MarketClient {
    MarketClient::new(&MarketConfig::default())
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn market_client_lists_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body()))
        .mount(&server)
        .await;

    let plugins = market_client(&server).plugins().await.unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].versions[1].options.as_ref().unwrap().git_ref, "v1.1");
}

#[tokio::test]
async fn market_server_error_is_a_catalog_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = market_client(&server).plugins().await.unwrap_err();
    assert!(matches!(err, PlugindError::Catalog { .. }));
}

#[tokio::test]
async fn market_db_fetches_catalog_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let plugin_db = PluginDb::new(&PlugindConfig::rooted_at(dir.path())).unwrap();
    let market = MarketDb::new(Arc::new(market_client(&server)), plugin_db, "17.10");

    let plugin = market.get("official", "admin-ui").await.unwrap();
    assert_eq!(plugin.installed_version, None);
    assert!(plugin.versions.iter().all(|v| v.upgradable));

    let err = market.get("official", "missing").await.unwrap_err();
    match err {
        PlugindError::Fetch { message, .. } => assert_eq!(message, "No such plugin official/missing"),
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn confd_client_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/infos"))
        .and(header("X-Auth-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uuid": "00000000-0000-0000-0000-000000000000",
            "wazo_version": "17.10"
        })))
        .mount(&server)
        .await;

    let config = ConfdConfig {
        token: Some("secret".to_string()),
        ..ConfdConfig::default()
    };
    let client = ConfdClient::new(&config).unwrap().with_base_url(server.uri());
    assert_eq!(client.wazo_version().await.unwrap(), "17.10");
}

#[tokio::test]
#[serial]
async fn environment_overrides_platform_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/infos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"wazo_version": "17.10"})))
        .mount(&server)
        .await;
    let client = ConfdClient::new(&ConfdConfig::default())
        .unwrap()
        .with_base_url(server.uri());
    let finder = WazoVersionFinder::new("PLUGIND_TEST_PLATFORM_VERSION", Arc::new(client));

    // SAFETY: serialized with the other environment-mutating tests.
    unsafe { std::env::remove_var("PLUGIND_TEST_PLATFORM_VERSION") };
    assert_eq!(finder.get_version().await.unwrap(), "17.10");

    unsafe { std::env::set_var("PLUGIND_TEST_PLATFORM_VERSION", "18.02") };
    assert_eq!(finder.get_version().await.unwrap(), "18.02");
    unsafe { std::env::remove_var("PLUGIND_TEST_PLATFORM_VERSION") };
}
