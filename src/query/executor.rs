//! Query Executor
//!
//! Runs MQL statements end to end against a [`QueryClient`]:
//!
//! ```text
//! text → parse → compile (bind + lift) → execute DAG → TimeSeriesResult
//! ```
//!
//! The whole execution runs under a statement deadline. When it expires, or
//! the caller drops the future, every in-flight backend call is dropped with
//! it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::kairos::QueryClient;
use crate::query::compiler::{CompiledStatement, Compiler};
use crate::query::error::{MqlError, MqlResult};
use crate::query::execution::{ExecutionContext, TimeSeriesResult};
use crate::query::parser::parse_statement;
use crate::query::registry::AggregatorRegistry;

/// Default statement deadline
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Query executor
pub struct QueryExecutor {
    client: Arc<dyn QueryClient>,
    registry: AggregatorRegistry,
    statement_timeout: Duration,
}

impl QueryExecutor {
    /// Create an executor with the default aggregators and deadline
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self {
            client,
            registry: AggregatorRegistry::default(),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Builder method: replace the aggregator registry
    pub fn with_registry(mut self, registry: AggregatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Builder method: set the statement deadline
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &AggregatorRegistry {
        &self.registry
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Parse and compile a statement
    pub fn compile(&self, text: &str) -> MqlResult<CompiledStatement> {
        self.compile_at(text, Utc::now())
    }

    /// Parse and compile with relative times resolved against `now`
    pub fn compile_at(&self, text: &str, now: DateTime<Utc>) -> MqlResult<CompiledStatement> {
        let statement = parse_statement(text)?;
        let compiled = Compiler::new(&self.registry).compile_at(&statement, now)?;
        Ok(compiled)
    }

    /// Execute a compiled statement
    pub async fn execute(&self, compiled: &CompiledStatement) -> MqlResult<TimeSeriesResult> {
        let started = Instant::now();
        let ctx = ExecutionContext::new(Arc::clone(&self.client));

        let result = match tokio::time::timeout(
            self.statement_timeout,
            compiled.terminal().execute(&ctx),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    "Statement deadline exceeded"
                );
                return Err(MqlError::Timeout(self.statement_timeout));
            }
        };

        let result = TimeSeriesResult::clone(&result).with_warnings(compiled.warnings().iter().cloned());

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            queries = result.response().queries.len(),
            warnings = result.warnings().len(),
            alerts = result.alerts().len(),
            "Statement executed"
        );

        Ok(result)
    }

    /// Parse, compile and execute a statement string
    pub async fn execute_str(&self, text: &str) -> MqlResult<TimeSeriesResult> {
        let compiled = self.compile(text)?;
        self.execute(&compiled).await
    }
}
