//! Lifecycle event classification.
//!
//! Event names arrive as free-form strings; [`LifecycleEvent::from_name`]
//! narrows them to the recognized set up front, and `None` means the
//! notification must not be relayed at all (no record mutation, empty 200
//! at the boundary). Classification itself is an exhaustive match, so adding
//! a variant forces a status decision at compile time instead of silently
//! defaulting.

use crate::notification::OrchestrationEventData;
use crate::CanonicalStatus;

/// The recognized orchestration lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeInstanceLaunch,
    HostInit,
    BeforeHostUp,
    HostUp,
    BeforeHostTerminate,
    HostDown,
    IpAddressChanged,
    ResumeComplete,
    HostInitFailed,
    ServiceNowEvent,
}

impl LifecycleEvent {
    /// Recognize an orchestration event name.
    ///
    /// Returns `None` for names outside the recognized set; such events are
    /// not relayed.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BeforeInstanceLaunch" => Some(Self::BeforeInstanceLaunch),
            "HostInit" => Some(Self::HostInit),
            "BeforeHostUp" => Some(Self::BeforeHostUp),
            "HostUp" => Some(Self::HostUp),
            "BeforeHostTerminate" => Some(Self::BeforeHostTerminate),
            "HostDown" => Some(Self::HostDown),
            "IPAddressChanged" => Some(Self::IpAddressChanged),
            "ResumeComplete" => Some(Self::ResumeComplete),
            "HostInitFailed" => Some(Self::HostInitFailed),
            "ServiceNowEvent" => Some(Self::ServiceNowEvent),
            _ => None,
        }
    }

    /// The event name as the orchestration platform sends it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeInstanceLaunch => "BeforeInstanceLaunch",
            Self::HostInit => "HostInit",
            Self::BeforeHostUp => "BeforeHostUp",
            Self::HostUp => "HostUp",
            Self::BeforeHostTerminate => "BeforeHostTerminate",
            Self::HostDown => "HostDown",
            Self::IpAddressChanged => "IPAddressChanged",
            Self::ResumeComplete => "ResumeComplete",
            Self::HostInitFailed => "HostInitFailed",
            Self::ServiceNowEvent => "ServiceNowEvent",
        }
    }

    /// Map this event to its canonical lifecycle status.
    ///
    /// `HostDown` inspects the suspend flag: a literal `"1"` means the
    /// server was suspended rather than terminated, and that override takes
    /// precedence over the table entry. `IPAddressChanged` carries no
    /// lifecycle meaning and classifies as
    /// [`CanonicalStatus::Unspecified`]: descriptive fields are still
    /// refreshed, the remote status is not.
    pub fn classify(&self, data: &OrchestrationEventData) -> CanonicalStatus {
        match self {
            Self::BeforeInstanceLaunch => CanonicalStatus::Provisioning,
            Self::HostInit => CanonicalStatus::Initializing,
            Self::BeforeHostUp => CanonicalStatus::Configuring,
            Self::HostUp => CanonicalStatus::Running,
            Self::BeforeHostTerminate => CanonicalStatus::Deprovisioning,
            Self::HostDown => {
                if data.is_suspend.as_deref() == Some("1") {
                    CanonicalStatus::Suspended
                } else {
                    CanonicalStatus::Terminated
                }
            }
            Self::IpAddressChanged => CanonicalStatus::Unspecified,
            Self::ResumeComplete => CanonicalStatus::Running,
            Self::HostInitFailed => CanonicalStatus::Failed,
            Self::ServiceNowEvent => CanonicalStatus::Running,
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
