//! Request authentication for inbound orchestration notifications.
//!
//! Every notification must prove two things before any payload parsing
//! happens: that it was produced by the trusted sender (shared-secret
//! HMAC-SHA1 signature over the raw body and date header), and that it is
//! fresh (declared timestamp within [`FRESHNESS_WINDOW_SECONDS`] of receipt,
//! in either direction).
//!
//! The signature is computed over the exact raw request body bytes followed
//! by the exact raw `Date` header string, not a re-serialized form. The hex
//! digest comparison is performed in constant time via
//! [`hmac::Mac::verify_slice`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maximum allowed absolute difference, in seconds, between the notification's
/// declared timestamp and receipt time. Bounds replay-attack exposure to a
/// five-minute window while tolerating clock skew in either direction.
pub const FRESHNESS_WINDOW_SECONDS: i64 = 300;

// ============================================================================
// Headers
// ============================================================================

/// The two HTTP headers the authentication protocol requires.
///
/// `date` is kept as the raw header string because the signature is computed
/// over those exact bytes; parsing happens later, during the freshness check.
#[derive(Debug, Clone)]
pub struct NotificationHeaders {
    /// Lowercase-hex HMAC-SHA1 digest from `X-Signature`.
    pub signature: String,
    /// Raw `Date` header value, exactly as received.
    pub date: String,
}

impl NotificationHeaders {
    /// Parse the required headers from an HTTP header map.
    ///
    /// Lookups are case-insensitive. A missing header is an authentication
    /// failure, not a payload error.
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Result<Self, AuthError> {
        let signature = headers
            .get("x-signature")
            .or_else(|| headers.get("X-Signature"))
            .ok_or(AuthError::MissingHeader {
                header: "X-Signature",
            })?
            .clone();

        let date = headers
            .get("date")
            .or_else(|| headers.get("Date"))
            .ok_or(AuthError::MissingHeader { header: "Date" })?
            .clone();

        Ok(Self { signature, date })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Authentication failures. All variants resolve to HTTP 403 at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required authentication header was absent.
    #[error("Missing required header: {header}")]
    MissingHeader { header: &'static str },

    /// The computed HMAC-SHA1 digest did not match the signature header.
    #[error("Signature does not match")]
    SignatureMismatch,

    /// The date header could not be parsed as a timestamp with offset.
    #[error("Unparseable date header: {value}")]
    InvalidDate { value: String },

    /// The declared timestamp is outside the freshness window.
    #[error("Request timestamp is {skew_seconds}s from receipt time (limit {FRESHNESS_WINDOW_SECONDS}s)")]
    StaleOrFutureRequest { skew_seconds: i64 },
}

// ============================================================================
// Time Source
// ============================================================================

/// Supplies the current timestamp for freshness checks.
///
/// Injected so tests can pin the clock; production code uses
/// [`SystemTimeSource`].
pub trait TimeSource: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// [`TimeSource`] backed by the system clock.
#[derive(Debug, Clone, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// RequestAuthenticator
// ============================================================================

/// Verifies a notification's signature and freshness using a shared secret.
///
/// Pure predicate apart from diagnostic logging: no state is mutated and no
/// I/O is performed. One instance is built at startup and shared across
/// request handlers.
pub struct RequestAuthenticator {
    signing_key: String,
    time_source: Arc<dyn TimeSource>,
}

impl RequestAuthenticator {
    /// Construct an authenticator with the given shared signing key.
    pub fn new(signing_key: String, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            signing_key,
            time_source,
        }
    }

    /// Validate a notification against the configured signing key and the
    /// current time from the injected [`TimeSource`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignatureMismatch`] when the digest does not
    /// match, [`AuthError::InvalidDate`] when the date header cannot be
    /// parsed, and [`AuthError::StaleOrFutureRequest`] when the declared
    /// timestamp is 300 seconds or more away from receipt time.
    pub fn validate(&self, headers: &NotificationHeaders, body: &[u8]) -> Result<(), AuthError> {
        self.validate_at(headers, body, self.time_source.now())
    }

    /// Validate against an explicit receipt time.
    ///
    /// The signature is checked before the date header is parsed, so a
    /// request with a garbage date and a bad signature reports the signature
    /// failure.
    pub fn validate_at(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.verify_signature(headers, body)?;
        self.verify_freshness(&headers.date, now)
    }

    /// Check the lowercase-hex HMAC-SHA1 digest over `body || date`.
    fn verify_signature(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
    ) -> Result<(), AuthError> {
        type HmacSha1 = Hmac<Sha1>;

        let sig_bytes = hex::decode(&headers.signature).map_err(|_| {
            debug!("Signature header is not valid hex");
            AuthError::SignatureMismatch
        })?;

        let mut mac = HmacSha1::new_from_slice(self.signing_key.as_bytes())
            .map_err(|_| AuthError::SignatureMismatch)?;
        mac.update(body);
        mac.update(headers.date.as_bytes());

        mac.verify_slice(&sig_bytes).map_err(|_| {
            debug!("Signature does not match");
            AuthError::SignatureMismatch
        })
    }

    /// Check that the declared timestamp is within the freshness window.
    fn verify_freshness(&self, date: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let declared = DateTime::parse_from_rfc2822(date)
            .or_else(|_| DateTime::parse_from_rfc3339(date))
            .map_err(|_| {
                debug!(date = %date, "Date header could not be parsed");
                AuthError::InvalidDate {
                    value: date.to_string(),
                }
            })?;

        let skew_seconds = (now - declared.with_timezone(&Utc)).num_seconds().abs();
        if skew_seconds >= FRESHNESS_WINDOW_SECONDS {
            debug!(
                skew_seconds,
                "Request timestamp is outside the freshness window"
            );
            return Err(AuthError::StaleOrFutureRequest { skew_seconds });
        }

        Ok(())
    }
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator")
            .field("signing_key", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
