//! # MQL
//!
//! Metrics Query Language: a small declarative language for querying and
//! aggregating time series stored in KairosDB, with a compiler that turns a
//! statement into a dependency graph of execution stages and an executor that
//! runs the graph concurrently.
//!
//! ## Features
//!
//! - **Parser**: line/column diagnostics, all problems reported at once
//! - **Lifting**: `max(of sel)` over a lone select becomes one remote query
//! - **Concurrent execution**: independent stages run in parallel, shared
//!   stages run once, the first failure cancels the rest
//! - **Threshold alerts**: flag datapoints crossing a value
//!
//! ## Modules
//!
//! - [`query`]: parser, compiler and executor
//! - [`kairos`]: KairosDB wire model and HTTP client
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mql::kairos::{KairosConfig, KairosDbClient};
//! use mql::query::QueryExecutor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(KairosDbClient::new(KairosConfig::default())?);
//!     let executor = QueryExecutor::new(client);
//!
//!     let result = executor
//!         .execute_str(r#"a = select cpu where host = "h1" from 2 hours ago; max(of a)"#)
//!         .await?;
//!
//!     for point in result.response().data_points() {
//!         println!("{} {}", point.time, point.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod kairos;
pub mod logging;
pub mod query;

// Re-export top-level types for convenience
pub use query::{
    parse_statement, CompileError, CompiledStatement, Compiler, MqlError, MqlResult,
    QueryExecutor, SyntaxError, TimeSeriesResult,
};

pub use kairos::{KairosConfig, KairosDbClient, KairosError, MetricsQuery, QueryClient};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, LoggingConfig};
