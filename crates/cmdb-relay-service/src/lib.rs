//! # CMDB Relay Service
//!
//! HTTP server for receiving orchestration lifecycle webhooks and relaying
//! them into the external record store.
//!
//! This service provides:
//! - The notification endpoint with signature + freshness authentication
//! - A health check endpoint
//! - Request logging with correlation IDs
//!
//! The boundary resolves core errors into fixed status codes: authentication
//! failures are 403, payload-shape failures are 404, store failures are 502.
//! A recognized, reconciled event answers 200 `"Ok"`; an unrecognized event
//! name answers 200 with an empty body and touches nothing.

pub mod snow_client;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use cmdb_relay_core::auth::{AuthError, NotificationHeaders, RequestAuthenticator, SystemTimeSource};
use cmdb_relay_core::event::LifecycleEvent;
use cmdb_relay_core::notification::{OrchestrationEventData, PayloadError, WebhookEnvelope};
use cmdb_relay_core::reconcile::{ExternalRecordClient, ReconcileError, RecordReconciler};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
///
/// Built once at startup and never mutated afterwards; every request handler
/// reads it concurrently without synchronization.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Authenticator for inbound notifications
    pub authenticator: Arc<RequestAuthenticator>,

    /// Reconciler driving the external record store
    pub reconciler: Arc<RecordReconciler>,
}

impl AppState {
    /// Assemble application state from configuration and a store client.
    pub fn new(config: ServiceConfig, client: Arc<dyn ExternalRecordClient>) -> Self {
        let authenticator = Arc::new(RequestAuthenticator::new(
            config.webhook.signing_key.clone(),
            Arc::new(SystemTimeSource),
        ));
        let reconciler = Arc::new(RecordReconciler::new(client));

        Self {
            config,
            authenticator,
            reconciler,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook authentication settings
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Record store settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl ServiceConfig {
    /// Reject configurations that cannot possibly serve traffic.
    ///
    /// Absent files and env vars produce built-in defaults, so the only way
    /// to catch an unconfigured secret or store is an explicit check here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.signing_key.is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.signing_key".to_string(),
            });
        }
        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.endpoint_path must start with '/': {}",
                    self.webhook.endpoint_path
                ),
            });
        }
        if self.store.base_url.is_empty() {
            return Err(ConfigError::Missing {
                key: "store.base_url".to_string(),
            });
        }
        if self.store.username.is_empty() {
            return Err(ConfigError::Missing {
                key: "store.username".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Webhook authentication configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Notification endpoint path
    pub endpoint_path: String,

    /// Shared secret for HMAC-SHA1 signature verification
    pub signing_key: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/servicenow/".to_string(),
            signing_key: String::new(),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("signing_key", &"<REDACTED>")
            .finish()
    }
}

/// Record store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the record store instance
    pub base_url: String,

    /// Table holding the asset records
    pub table: String,

    /// Basic-auth username
    pub username: String,

    /// Basic-auth password
    pub password: String,

    /// Request timeout in seconds for store calls
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            table: "u_scalr_servers".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            &state.config.webhook.endpoint_path,
            post(handle_notification),
        )
        .route("/health", get(handle_health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server with graceful shutdown on SIGINT/SIGTERM.
pub async fn start_server(
    config: ServiceConfig,
    client: Arc<dyn ExternalRecordClient>,
) -> Result<(), ServiceError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, client);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight requests are allowed to complete; new connections are
    // refused as soon as the signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Notification Handler
// ============================================================================

/// Handle an orchestration lifecycle notification.
///
/// Pipeline per request: authenticate (signature + freshness), parse the
/// envelope, recognize the event name, decode the typed event data, then
/// reconcile into the record store. Each stage's failure maps to a fixed
/// status code via [`WebhookHandlerError`].
#[instrument(skip(state, headers, body))]
pub async fn handle_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<NotificationOutcome, WebhookHandlerError> {
    // Convert headers to HashMap
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let notification_headers = NotificationHeaders::from_http_headers(&header_map)?;
    state.authenticator.validate(&notification_headers, &body)?;

    let envelope = WebhookEnvelope::from_body(&body)?;

    let Some(event) = LifecycleEvent::from_name(&envelope.event_name) else {
        info!(event = %envelope.event_name, "Received request for unhandled event");
        return Ok(NotificationOutcome::Ignored);
    };

    let data = OrchestrationEventData::from_envelope(&envelope)?;

    let record = state.reconciler.reconcile(event, &data).await?;

    info!(
        event = %event,
        server_id = %data.server_id,
        sys_id = %record.sys_id,
        "Notification reconciled"
    );

    Ok(NotificationOutcome::Reconciled)
}

/// Basic health check endpoint
#[instrument(skip(_state))]
async fn handle_health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking.
///
/// Extracts or generates a correlation ID, logs request completion with
/// structured fields at a level matching the status code, and propagates the
/// ID through the response headers.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Outcome of a handled notification, as the orchestration platform sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// A recognized event was reconciled into the record store.
    Reconciled,
    /// The event name is outside the recognized set; nothing was touched.
    Ignored,
}

impl IntoResponse for NotificationOutcome {
    fn into_response(self) -> Response {
        match self {
            // The sender's delivery check expects this exact body.
            Self::Reconciled => (StatusCode::OK, "Ok").into_response(),
            Self::Ignored => (StatusCode::OK, "").into_response(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// Notification handler errors with HTTP status code mapping.
///
/// - `403 Forbidden`: the request could not be authenticated (missing
///   headers, signature mismatch, stale or future timestamp).
/// - `404 Not Found`: the request was authentic but its payload shape is
///   unusable (bad JSON, missing envelope keys, incomplete event data).
/// - `502 Bad Gateway`: the record store call failed. The sender can
///   distinguish "the relay rejected you" from "the store is down".
///
/// Detailed errors are logged server-side; response bodies stay terse.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Signature or freshness verification failed.
    #[error("Authentication failed: {0}")]
    Unauthenticated(#[from] AuthError),

    /// The body was not a usable notification payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// The store rejected or failed the reconciliation calls.
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] ReconcileError),
}

impl WebhookHandlerError {
    /// The HTTP status this error resolves to at the boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::FORBIDDEN,
            Self::InvalidPayload(_) => StatusCode::NOT_FOUND,
            Self::ReconciliationFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Unauthenticated(e) => {
                warn!(error = %e, "Rejecting unauthenticated notification");
            }
            Self::InvalidPayload(e) => {
                info!(error = %e, "Invalid request received");
            }
            Self::ReconciliationFailed(e) => {
                error!(error = %e, "Record store reconciliation failed");
            }
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
