//! MQL API Server
//!
//! Run with: cargo run --bin mql-api
//!
//! # Configuration
//!
//! Read from the first config file found (see [`mql::config::Config::search_paths`]),
//! or from `MQL_CONFIG` when set, then overridden by `MQL_*` environment
//! variables. `RUST_LOG` overrides the configured log level.

use mql::api::{serve, AppState};
use mql::config::Config;
use mql::kairos::KairosDbClient;
use mql::query::QueryExecutor;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("MQL_CONFIG") {
        Ok(path) => Config::load_with_env(&PathBuf::from(path))?,
        Err(_) => Config::load_default(),
    };
    config.validate()?;

    mql::logging::init_tracing(&config.logging)?;

    tracing::info!("Starting MQL API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("KairosDB: {}", config.kairosdb.url);

    let client = Arc::new(KairosDbClient::new(config.kairosdb.client_config())?);
    let executor = Arc::new(
        QueryExecutor::new(client).with_statement_timeout(config.query.statement_timeout()),
    );
    tracing::info!(
        "Statement timeout: {}s, aggregators: {}",
        config.query.statement_timeout_secs,
        executor.registry().names().join(", ")
    );

    let state = AppState::new(executor, config.api.clone(), config.kairosdb.url.clone());

    tracing::info!("Starting server on {}:{}", config.api.host, config.api.port);
    serve(state, &config.api).await?;

    tracing::info!("MQL API server stopped");
    Ok(())
}
