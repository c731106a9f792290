//! Event-to-record reconciliation.
//!
//! The reconciler turns a classified lifecycle event into exactly one store
//! mutation: a create when no record exists for the server's external id, an
//! update otherwise. It never deletes records and never writes the external
//! id on update.
//!
//! Lookup and write are two separate network round-trips with no distributed
//! lock, so two notifications for the same server arriving concurrently can
//! race (both create, or one update stale data). That race is accepted; the
//! store is the source of truth and the next notification converges it.

use crate::event::LifecycleEvent;
use crate::notification::OrchestrationEventData;
use crate::record::{to_record_fields, ExternalRecord, EXTERNAL_ID_FIELD, STATUS_FIELD};
use crate::ServerId;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Error Types
// ============================================================================

/// Failures talking to the external record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport-level failure (connection refused, timeout, TLS).
    #[error("Store request failed: {message}")]
    RequestFailed { message: String },

    /// The store answered with a non-success HTTP status.
    #[error("Store returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The store answered 2xx but the body did not have the expected shape.
    #[error("Store response could not be decoded: {message}")]
    InvalidResponse { message: String },
}

/// Reconciliation failures, tagged with the operation that failed.
///
/// No retry is attempted here; retry policy, if any, belongs to an outer
/// layer.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Record lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Record creation failed: {0}")]
    Create(#[source] StoreError),

    #[error("Record update failed: {0}")]
    Update(#[source] StoreError),
}

// ============================================================================
// External Record Client
// ============================================================================

/// Narrow capability the reconciler needs from the external record store.
///
/// Implemented over the store's REST table API by the service crate; mocked
/// in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalRecordClient: Send + Sync {
    /// Fetch all records whose external-id field matches `id`.
    ///
    /// A healthy store returns zero or one record; more than one is an
    /// external-store anomaly the reconciler tolerates.
    async fn find_by_external_id(&self, id: &ServerId)
        -> Result<Vec<ExternalRecord>, StoreError>;

    /// Insert a new record and return it as the store reports it.
    async fn create(&self, fields: Map<String, Value>) -> Result<ExternalRecord, StoreError>;

    /// Partially update the record addressed by `sys_id` and return it as
    /// the store reports it.
    async fn update(
        &self,
        sys_id: &str,
        fields: Map<String, Value>,
    ) -> Result<ExternalRecord, StoreError>;
}

// ============================================================================
// RecordReconciler
// ============================================================================

/// Orchestrates lookup → create-or-update for one notification.
///
/// Stateless apart from the injected client; safe to share across request
/// handlers behind an `Arc`.
pub struct RecordReconciler {
    client: Arc<dyn ExternalRecordClient>,
}

impl RecordReconciler {
    /// Create a reconciler over the given store client.
    pub fn new(client: Arc<dyn ExternalRecordClient>) -> Self {
        Self { client }
    }

    /// Reconcile one classified notification into the record store.
    ///
    /// Create path: full field projection plus the status field, written
    /// unconditionally (even [`crate::CanonicalStatus::Unspecified`]), so a
    /// fresh record always reflects exactly what the classifying event
    /// produced.
    ///
    /// Update path: full field projection with the external-id field
    /// removed (immutable after creation), and the status field only when
    /// the event carries one. Events like `IPAddressChanged` refresh the
    /// descriptive fields while leaving the remote status untouched.
    ///
    /// # Errors
    ///
    /// Store failures propagate as [`ReconcileError`] wrapping the failed
    /// operation; nothing is retried.
    pub async fn reconcile(
        &self,
        event: LifecycleEvent,
        data: &OrchestrationEventData,
    ) -> Result<ExternalRecord, ReconcileError> {
        let server_id = &data.server_id;
        let status = event.classify(data);

        let matches = self
            .client
            .find_by_external_id(server_id)
            .await
            .map_err(ReconcileError::Lookup)?;

        if matches.len() > 1 {
            // Known external-store anomaly: not auto-healed, first match wins.
            warn!(
                server_id = %server_id,
                matches = matches.len(),
                "Several records found for one external id; updating the first"
            );
        }

        match matches.into_iter().next() {
            None => {
                info!(server_id = %server_id, event = %event, status = %status.as_str(), "Creating record");
                let mut fields = to_record_fields(data);
                fields.insert(
                    STATUS_FIELD.to_string(),
                    Value::String(status.as_str().to_string()),
                );
                self.client
                    .create(fields)
                    .await
                    .map_err(ReconcileError::Create)
            }
            Some(existing) => {
                info!(server_id = %server_id, event = %event, sys_id = %existing.sys_id, "Updating record");
                let mut fields = to_record_fields(data);
                fields.remove(EXTERNAL_ID_FIELD);
                if !status.is_unspecified() {
                    fields.insert(
                        STATUS_FIELD.to_string(),
                        Value::String(status.as_str().to_string()),
                    );
                }
                self.client
                    .update(&existing.sys_id, fields)
                    .await
                    .map_err(ReconcileError::Update)
            }
        }
    }
}

impl std::fmt::Debug for RecordReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReconciler")
            .field("client", &"<ExternalRecordClient>")
            .finish()
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
