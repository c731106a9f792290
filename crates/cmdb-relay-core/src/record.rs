//! External record schema and field projection.
//!
//! The record store keys every asset record two ways: `sys_id`, the opaque
//! identifier the store assigns on insert and the only valid update address,
//! and `u_id`, the stable external identifier the orchestration platform
//! assigns. Exactly one record should exist per `u_id`.

use crate::notification::OrchestrationEventData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record field holding the external identifier. Immutable after creation;
/// the reconciler strips it from update payloads.
pub const EXTERNAL_ID_FIELD: &str = "u_id";

/// Record field holding the canonical lifecycle status.
pub const STATUS_FIELD: &str = "u_status";

// ============================================================================
// External Record
// ============================================================================

/// An asset record as reported by the external record store.
///
/// Only the fields the relay reasons about are typed; everything else the
/// store returns is retained in `extra` untouched, since the store is the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Opaque identifier assigned by the store; used for update addressing.
    pub sys_id: String,

    /// Stable external identifier assigned by the orchestration platform.
    pub u_id: String,

    /// Canonical lifecycle status as currently stored.
    #[serde(default)]
    pub u_status: String,

    /// Remaining record fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Record Mapper
// ============================================================================

/// Project orchestration event data into the record store's field schema.
///
/// A pure projection: every field is re-derived fully from the current
/// notification, with no merging against prior state. The status field is
/// not part of the projection; the reconciler decides whether to write it.
/// `farm_id` is deliberately not projected; the store has no field for it.
pub fn to_record_fields(data: &OrchestrationEventData) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        EXTERNAL_ID_FIELD.to_string(),
        Value::String(data.server_id.as_str().to_string()),
    );
    fields.insert(
        "u_environment_id".to_string(),
        Value::String(data.environment_id.clone()),
    );
    fields.insert(
        "u_account_id".to_string(),
        Value::String(data.account_id.clone()),
    );
    fields.insert(
        "u_cloud_platform".to_string(),
        Value::String(data.cloud_platform.clone()),
    );
    fields.insert(
        "u_cloud_location".to_string(),
        Value::String(data.cloud_location.clone()),
    );
    fields.insert(
        "u_farm_role_alias".to_string(),
        Value::String(data.farm_role_alias.clone()),
    );
    fields.insert(
        "u_farm_role_id".to_string(),
        Value::String(data.farm_role_id.clone()),
    );
    fields.insert(
        "u_hostname".to_string(),
        Value::String(data.hostname.clone()),
    );
    fields.insert(
        "u_public_ip".to_string(),
        Value::String(data.public_ip.clone()),
    );
    fields.insert(
        "u_private_ip".to_string(),
        Value::String(data.private_ip.clone()),
    );
    fields.insert(
        "u_instance_type".to_string(),
        Value::String(data.instance_type.clone()),
    );
    fields.insert("u_farm".to_string(), Value::String(data.farm_name.clone()));
    fields
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
