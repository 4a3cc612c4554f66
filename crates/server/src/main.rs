//! ClaimCDR FHIR server (`cdr`)
//!
//! Serves a FHIR DSTU2, DSTU3 or R4 endpoint for the claims data
//! repository. The version is chosen at startup with `--fhir-version`.

mod beans;
mod catalog;
mod sqlite;

use std::sync::Arc;

use clap::Parser;
use claimcdr_rest::{ServerBootstrap, ServerConfig, StartupGuard, create_app, init_logging};
use tracing::info;

use crate::sqlite::{SqliteStore, SqliteStoreConfig};

/// Database file used when `CDR_DATABASE_URL` is unset.
const DEFAULT_DATABASE: &str = "cdr.db";

fn database_path(config: &ServerConfig) -> &str {
    config.database_url.as_deref().unwrap_or(DEFAULT_DATABASE)
}

/// Opens the SQLite store from the server configuration.
fn create_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    let db_path = database_path(config);
    info!(database = %db_path, "Initializing SQLite store");

    let store = SqliteStore::with_config(db_path, SqliteStoreConfig::default())?;
    store.purge_expired()?;
    Ok(store)
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        fhir_version = %config.fhir_version,
        "Starting ClaimCDR FHIR Server"
    );

    let store = create_store(&config)?;
    let registry = beans::build_registry(&config, store);

    let server = ServerBootstrap::new(config.clone(), Arc::new(registry))
        .initialize(StartupGuard::process())?;

    serve(create_app(server), &config).await
}
