//! Production [`ExternalRecordClient`] implementation over the record
//! store's REST table API.
//!
//! All three operations address the configured table:
//!
//! | operation | request |
//! |-----------|---------|
//! | lookup    | `GET {base}/api/now/table/{table}?u_id={id}` |
//! | create    | `POST {base}/api/now/table/{table}` |
//! | update    | `PATCH {base}/api/now/table/{table}/{sys_id}` |
//!
//! The store wraps every response payload in `{"result": ...}` and accepts
//! basic credentials; both come from configuration established at startup.

use async_trait::async_trait;
use cmdb_relay_core::reconcile::{ExternalRecordClient, StoreError};
use cmdb_relay_core::record::{ExternalRecord, EXTERNAL_ID_FIELD};
use cmdb_relay_core::ServerId;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::{ConfigError, StoreConfig};

/// The store's envelope around every successful response body.
#[derive(Debug, Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

// ============================================================================
// ServiceNowClient
// ============================================================================

/// REST client for the external record store.
///
/// Holds a pooled [`reqwest::Client`] with the configured timeout; cheap to
/// clone and safe to share across request handlers.
#[derive(Clone)]
pub struct ServiceNowClient {
    http_client: reqwest::Client,
    config: StoreConfig,
}

impl ServiceNowClient {
    /// Build a client from the store section of the service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Base URL of the configured table, without a trailing slash.
    fn table_url(&self) -> String {
        format!(
            "{}/api/now/table/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Send a prepared request and decode the store's result envelope.
    ///
    /// Non-2xx statuses become [`StoreError::UnexpectedStatus`] carrying the
    /// response body for diagnostics.
    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope =
            response
                .json::<ResultEnvelope<T>>()
                .await
                .map_err(|e| StoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        Ok(envelope.result)
    }
}

#[async_trait]
impl ExternalRecordClient for ServiceNowClient {
    async fn find_by_external_id(
        &self,
        id: &ServerId,
    ) -> Result<Vec<ExternalRecord>, StoreError> {
        debug!(server_id = %id, "Querying store for existing record");
        let request = self
            .http_client
            .get(self.table_url())
            .query(&[(EXTERNAL_ID_FIELD, id.as_str())]);
        self.execute(request).await
    }

    async fn create(&self, fields: Map<String, Value>) -> Result<ExternalRecord, StoreError> {
        debug!("Inserting record into store");
        let request = self.http_client.post(self.table_url()).json(&fields);
        self.execute(request).await
    }

    async fn update(
        &self,
        sys_id: &str,
        fields: Map<String, Value>,
    ) -> Result<ExternalRecord, StoreError> {
        debug!(sys_id = %sys_id, "Patching record in store");
        let request = self
            .http_client
            .patch(format!("{}/{}", self.table_url(), sys_id))
            .json(&fields);
        self.execute(request).await
    }
}

impl std::fmt::Debug for ServiceNowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "snow_client_tests.rs"]
mod tests;
