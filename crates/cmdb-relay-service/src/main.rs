//! # CMDB Relay Service
//!
//! Binary entry point for the CMDB relay HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes logging
//! - Builds the record store client
//! - Starts the HTTP server from cmdb-relay-service

use cmdb_relay_service::{snow_client::ServiceNowClient, start_server, ServiceConfig, ServiceError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cmdb_relay_service=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CMDB Relay Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/cmdb-relay/service.yaml        — system-wide defaults
    //  2. ./config/service.yaml               — deployment-local override
    //  3. Path given by RELAY_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed RELAY__ (double-underscore separator)
    //     e.g. RELAY__SERVER__PORT=9090 sets server.port = 9090
    //
    // All fields carry serde defaults, so absent files produce a config that
    // only fails the explicit validation of required secrets below.  A
    // malformed file or an environment variable that cannot be coerced to the
    // correct type IS a hard error because it indicates deliberate-but-broken
    // operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/cmdb-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("RELAY_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("RELAY").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    info!(
        endpoint_path = %service_config.webhook.endpoint_path,
        store_base_url = %service_config.store.base_url,
        store_table = %service_config.store.table,
        store_username = %service_config.store.username,
        "Configuration loaded"
    );

    // Build the record store client
    let store_client = match ServiceNowClient::new(service_config.store.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build record store client; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(service_config, store_client).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
