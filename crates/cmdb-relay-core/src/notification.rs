//! Notification envelope parsing and typed event data.
//!
//! The inbound body is decoded in two steps. First the JSON envelope
//! (`eventName` + `data`) is parsed; any shape problem at this level is a
//! [`PayloadError::MalformedPayload`]. Second, for events that will be
//! relayed, the `data` mapping is decoded into a fully-populated
//! [`OrchestrationEventData`]; a missing required key is a single
//! [`PayloadError::IncompleteEventData`] naming the field, rather than a
//! failure deep inside record mapping.

use crate::ServerId;
use serde::Deserialize;
use std::collections::HashMap;

// ============================================================================
// Error Types
// ============================================================================

/// Payload-shape failures. All variants resolve to HTTP 404 at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The body was not a JSON object with `eventName` and `data`.
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// A required key was absent from the event data mapping.
    #[error("Incomplete event data: missing {field}")]
    IncompleteEventData { field: &'static str },
}

// ============================================================================
// Webhook Envelope
// ============================================================================

/// The outer shape of every orchestration notification.
///
/// Immutable once parsed; consumed once per request.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Orchestration event name, e.g. `HostUp`.
    #[serde(rename = "eventName")]
    pub event_name: String,

    /// Raw event data mapping. Values are strings on the wire.
    pub data: HashMap<String, String>,
}

impl WebhookEnvelope {
    /// Parse an envelope from the raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::MalformedPayload`] when the body is not valid
    /// JSON, lacks `eventName` or `data`, or carries non-string data values.
    pub fn from_body(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(|e| PayloadError::MalformedPayload {
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Typed Event Data
// ============================================================================

/// Fully-validated orchestration event data.
///
/// Every field the relay projects into the external record is required; the
/// suspend flag is optional because only termination events carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationEventData {
    pub server_id: ServerId,
    pub environment_id: String,
    pub account_id: String,
    pub cloud_platform: String,
    pub cloud_location: String,
    pub farm_role_alias: String,
    pub farm_role_id: String,
    pub hostname: String,
    pub public_ip: String,
    pub private_ip: String,
    pub instance_type: String,
    pub farm_name: String,
    /// Farm identifier. Required on the wire but not projected into record
    /// fields.
    pub farm_id: String,
    /// `"1"` when a termination event is actually a suspension.
    pub is_suspend: Option<String>,
}

impl OrchestrationEventData {
    /// Decode the typed event data from an envelope's `data` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::IncompleteEventData`] naming the first
    /// missing required key.
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Result<Self, PayloadError> {
        let data = &envelope.data;

        Ok(Self {
            server_id: ServerId::new(required(data, "SCALR_SERVER_ID")?),
            environment_id: required(data, "SCALR_ENV_ID")?,
            account_id: required(data, "SCALR_ACCOUNT_ID")?,
            cloud_platform: required(data, "SCALR_CLOUD_PLATFORM")?,
            cloud_location: required(data, "SCALR_CLOUD_LOCATION")?,
            farm_role_alias: required(data, "SCALR_FARM_ROLE_ALIAS")?,
            farm_role_id: required(data, "SCALR_FARM_ROLE_ID")?,
            hostname: required(data, "SCALR_SERVER_HOSTNAME")?,
            public_ip: required(data, "SCALR_EXTERNAL_IP")?,
            private_ip: required(data, "SCALR_INTERNAL_IP")?,
            instance_type: required(data, "SCALR_SERVER_TYPE")?,
            farm_name: required(data, "SCALR_FARM_NAME")?,
            farm_id: required(data, "SCALR_FARM_ID")?,
            is_suspend: data.get("SCALR_IS_SUSPEND").cloned(),
        })
    }
}

/// Extract a required key from the event data mapping.
fn required(
    data: &HashMap<String, String>,
    field: &'static str,
) -> Result<String, PayloadError> {
    data.get(field)
        .cloned()
        .ok_or(PayloadError::IncompleteEventData { field })
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
