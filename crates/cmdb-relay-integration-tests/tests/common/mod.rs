//! Common test utilities for cmdb-relay integration tests
//!
//! This module provides:
//! - Application state wired against a wiremock record store
//! - Request signing helpers matching the orchestration platform's scheme
//! - Payload builders for lifecycle notifications

use axum::http::{HeaderMap, HeaderValue};
use cmdb_relay_service::{
    snow_client::ServiceNowClient, AppState, ServiceConfig, StoreConfig, WebhookConfig,
};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use wiremock::MockServer;

/// Shared secret used to sign test notifications.
#[allow(dead_code)]
pub const TEST_SIGNING_KEY: &str = "test-signing-key";

/// Table the test store serves.
#[allow(dead_code)]
pub const TEST_TABLE: &str = "u_scalr_servers";

/// Build application state whose store client points at the given mock
/// server.
#[allow(dead_code)]
pub fn create_test_app_state(store: &MockServer) -> AppState {
    let config = ServiceConfig {
        webhook: WebhookConfig {
            signing_key: TEST_SIGNING_KEY.to_string(),
            ..Default::default()
        },
        store: StoreConfig {
            base_url: store.uri(),
            table: TEST_TABLE.to_string(),
            username: "relay".to_string(),
            password: "hunter2".to_string(),
            timeout_seconds: 5,
        },
        ..Default::default()
    };

    let client =
        Arc::new(ServiceNowClient::new(config.store.clone()).expect("store client should build"));

    AppState::new(config, client)
}

/// Sign `body` and `date` with the given key the way the orchestration
/// platform does: HMAC-SHA1 over body bytes then the date string, hex
/// encoded.
#[allow(dead_code)]
pub fn sign(key: &str, body: &[u8], date: &str) -> String {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.update(date.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// A current RFC 2822 date string, as the platform sends it.
#[allow(dead_code)]
pub fn current_date_header() -> String {
    chrono::Utc::now().to_rfc2822()
}

/// Headers carrying a valid signature for `body` at the current time.
#[allow(dead_code)]
pub fn signed_headers(body: &[u8]) -> HeaderMap {
    let date = current_date_header();
    signed_headers_at(body, &date)
}

/// Headers carrying a valid signature for `body` at the given date.
#[allow(dead_code)]
pub fn signed_headers_at(body: &[u8], date: &str) -> HeaderMap {
    let signature = sign(TEST_SIGNING_KEY, body, date);

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-signature",
        HeaderValue::from_str(&signature).expect("signature is ASCII"),
    );
    headers.insert("date", HeaderValue::from_str(date).expect("date is ASCII"));
    headers
}

/// A complete notification body for `event_name` describing server
/// `srv-1001`.
#[allow(dead_code)]
pub fn notification_body(event_name: &str) -> Vec<u8> {
    notification_body_with(event_name, |_| {})
}

/// Like [`notification_body`] but lets the caller adjust the data map.
#[allow(dead_code)]
pub fn notification_body_with(
    event_name: &str,
    adjust: impl FnOnce(&mut serde_json::Map<String, serde_json::Value>),
) -> Vec<u8> {
    let mut data = serde_json::Map::new();
    for (key, value) in [
        ("SCALR_SERVER_ID", "srv-1001"),
        ("SCALR_ENV_ID", "env-7"),
        ("SCALR_ACCOUNT_ID", "acct-3"),
        ("SCALR_CLOUD_PLATFORM", "ec2"),
        ("SCALR_CLOUD_LOCATION", "us-east-1"),
        ("SCALR_FARM_ROLE_ALIAS", "web"),
        ("SCALR_FARM_ROLE_ID", "role-42"),
        ("SCALR_SERVER_HOSTNAME", "web-1.example.internal"),
        ("SCALR_EXTERNAL_IP", "203.0.113.10"),
        ("SCALR_INTERNAL_IP", "10.0.0.10"),
        ("SCALR_SERVER_TYPE", "m5.large"),
        ("SCALR_FARM_NAME", "production-web"),
        ("SCALR_FARM_ID", "farm-9"),
    ] {
        data.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }
    adjust(&mut data);

    serde_json::to_vec(&serde_json::json!({
        "eventName": event_name,
        "data": data,
    }))
    .expect("notification body serializes")
}

/// A store record payload as the table API reports it.
#[allow(dead_code)]
pub fn store_record(sys_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "sys_id": sys_id,
        "u_id": "srv-1001",
        "u_status": status,
    })
}
