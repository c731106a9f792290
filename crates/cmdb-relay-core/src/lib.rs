//! # CMDB Relay Core
//!
//! Core business logic for the CMDB relay webhook intake service.
//!
//! This crate contains the domain logic for authenticating orchestration
//! lifecycle notifications, classifying them into canonical asset statuses,
//! and reconciling those statuses into an external record store.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations (HTTP client, clock) are injected at runtime
//! - The record store is abstracted behind the [`reconcile::ExternalRecordClient`] trait
//!
//! ## Usage
//!
//! ```rust
//! use cmdb_relay_core::{CanonicalStatus, ServerId};
//!
//! let server_id = ServerId::new("3f6d9a2c-8f4b-4c0e-9b7a-1c2d3e4f5a6b");
//! assert_eq!(CanonicalStatus::Running.as_str(), "running");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod auth;
pub mod event;
pub mod notification;
pub mod reconcile;
pub mod record;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Stable identifier assigned by the orchestration platform to a managed server.
///
/// This is the primary correlation key against the external record store
/// (stored there as the `u_id` field). It is assigned at launch time and
/// never changes for the lifetime of the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(String);

impl ServerId {
    /// Create a new server ID from the orchestration platform's identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Canonical Lifecycle Status
// ============================================================================

/// Normalized lifecycle state written to the external record.
///
/// [`CanonicalStatus::Unspecified`] is the "no mapping" default: it carries
/// no lifecycle meaning and must not overwrite the remote record's current
/// status on update. On create it is written verbatim (as the empty string),
/// so a freshly created record always reflects exactly what the classifying
/// event produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Provisioning,
    Initializing,
    Configuring,
    Running,
    Deprovisioning,
    Terminated,
    Suspended,
    Failed,
    /// No status change; serialized as the empty string in record fields.
    Unspecified,
}

impl CanonicalStatus {
    /// The wire value written to the record store's `u_status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Initializing => "initializing",
            Self::Configuring => "configuring",
            Self::Running => "running",
            Self::Deprovisioning => "deprovisioning",
            Self::Terminated => "terminated",
            Self::Suspended => "suspended",
            Self::Failed => "failed",
            Self::Unspecified => "",
        }
    }

    /// Whether this status should be omitted from update payloads.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
