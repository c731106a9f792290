//! Tests for [`ServiceNowClient`] against a wiremock store.

use super::*;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn client_for(server: &MockServer) -> ServiceNowClient {
    let config = StoreConfig {
        base_url: server.uri(),
        table: "u_scalr_servers".to_string(),
        username: "relay".to_string(),
        password: "hunter2".to_string(),
        timeout_seconds: 5,
    };
    ServiceNowClient::new(config).expect("client should build")
}

fn record_json(sys_id: &str) -> serde_json::Value {
    json!({
        "sys_id": sys_id,
        "u_id": "srv-1001",
        "u_status": "running",
        "u_hostname": "web-1.example.internal"
    })
}

// ============================================================================
// Lookup tests
// ============================================================================

mod lookup_tests {
    use super::*;

    /// Lookups query the table endpoint by the external-id field and carry
    /// basic credentials.
    #[tokio::test]
    async fn test_find_queries_by_external_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/u_scalr_servers"))
            .and(query_param("u_id", "srv-1001"))
            .and(basic_auth("relay", "hunter2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": [record_json("abc")] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .find_by_external_id(&ServerId::new("srv-1001"))
            .await
            .expect("lookup should succeed");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sys_id, "abc");
        assert_eq!(records[0].u_id, "srv-1001");
    }

    /// An empty result set is a normal answer, not an error.
    #[tokio::test]
    async fn test_find_with_no_matches_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/u_scalr_servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .mount(&server)
            .await;

        let records = client_for(&server)
            .find_by_external_id(&ServerId::new("srv-unknown"))
            .await
            .expect("lookup should succeed");

        assert!(records.is_empty());
    }
}

// ============================================================================
// Write tests
// ============================================================================

mod write_tests {
    use super::*;

    /// Creates post the field map as JSON to the table endpoint.
    #[tokio::test]
    async fn test_create_posts_fields() {
        let server = MockServer::start().await;
        let fields: Map<String, Value> =
            serde_json::from_value(json!({ "u_id": "srv-1001", "u_status": "running" }))
                .expect("fields fixture");

        Mock::given(method("POST"))
            .and(path("/api/now/table/u_scalr_servers"))
            .and(body_json(json!({ "u_id": "srv-1001", "u_status": "running" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "result": record_json("new") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server)
            .create(fields)
            .await
            .expect("create should succeed");

        assert_eq!(record.sys_id, "new");
    }

    /// Updates patch the record addressed by its store-internal id.
    #[tokio::test]
    async fn test_update_patches_by_sys_id() {
        let server = MockServer::start().await;
        let fields: Map<String, Value> =
            serde_json::from_value(json!({ "u_status": "terminated" })).expect("fields fixture");

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/u_scalr_servers/abc123"))
            .and(body_json(json!({ "u_status": "terminated" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": record_json("abc123") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = client_for(&server)
            .update("abc123", fields)
            .await
            .expect("update should succeed");

        assert_eq!(record.sys_id, "abc123");
    }
}

// ============================================================================
// Failure tests
// ============================================================================

mod failure_tests {
    use super::*;

    /// Non-success statuses surface with the status and the body.
    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance window"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .find_by_external_id(&ServerId::new("srv-1001"))
            .await;

        match result {
            Err(StoreError::UnexpectedStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance window");
            }
            other => panic!("expected UnexpectedStatus, got {:?}", other),
        }
    }

    /// A 2xx body missing the result envelope is a decode failure.
    #[tokio::test]
    async fn test_missing_result_envelope_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "sys_id": "abc" }])))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .find_by_external_id(&ServerId::new("srv-1001"))
            .await;

        assert!(matches!(result, Err(StoreError::InvalidResponse { .. })));
    }

    /// Trailing slashes in the configured base URL do not double up.
    #[tokio::test]
    async fn test_trailing_slash_in_base_url_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/u_scalr_servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let config = StoreConfig {
            base_url: format!("{}/", server.uri()),
            table: "u_scalr_servers".to_string(),
            username: "relay".to_string(),
            password: "hunter2".to_string(),
            timeout_seconds: 5,
        };
        let client = ServiceNowClient::new(config).expect("client should build");

        let result = client.find_by_external_id(&ServerId::new("srv-1001")).await;
        assert!(result.is_ok());
    }
}
