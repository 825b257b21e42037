//! Stage Execution DAG
//!
//! A compiled statement is a graph of [`StageExecution`] nodes. Running a
//! node:
//!
//! 1. launches every direct dependency concurrently
//! 2. joins them; the first failure fails the node and drops the branches
//!    still in flight
//! 3. hands the results, keyed by [`StageId`], to the node's own logic
//!
//! A node reachable through several paths runs once per execution: results
//! are memoized by id in the [`ExecutionContext`], which lives for one
//! statement execution only.

mod alert;
mod result;
mod select;
mod union;

pub use alert::{NonNumericPolicy, ThresholdAlert, ThresholdOperator};
pub use result::{AlertTrigger, TimeSeriesResult};

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::kairos::{MetricsQuery, QueryClient};
use crate::query::error::{MqlError, MqlResult};

/// Stable identifier of a node within one compiled statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StageId(pub usize);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node does once its dependencies are ready
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionKind {
    /// One remote query
    Select(MetricsQuery),
    /// Concatenate dependency results
    Union,
    /// Union plus threshold evaluation
    Threshold(ThresholdAlert),
}

impl ExecutionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Union => "union",
            Self::Threshold(_) => "threshold",
        }
    }
}

/// A node of the execution graph
#[derive(Debug, PartialEq)]
pub struct StageExecution {
    id: StageId,
    name: Option<String>,
    dependencies: Vec<Arc<StageExecution>>,
    kind: ExecutionKind,
}

impl StageExecution {
    pub fn new(
        id: StageId,
        name: Option<String>,
        dependencies: Vec<Arc<StageExecution>>,
        kind: ExecutionKind,
    ) -> Self {
        Self {
            id,
            name,
            dependencies,
            kind,
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn dependencies(&self) -> &[Arc<StageExecution>] {
        &self.dependencies
    }

    pub fn kind(&self) -> &ExecutionKind {
        &self.kind
    }

    /// Run this node, and its dependencies first, within `ctx`
    pub fn execute<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, MqlResult<Arc<TimeSeriesResult>>> {
        async move {
            let cell = ctx.cell(self.id);
            let result = cell.get_or_try_init(|| self.run(ctx)).await?;
            Ok(Arc::clone(result))
        }
        .boxed()
    }

    async fn run(&self, ctx: &ExecutionContext) -> MqlResult<Arc<TimeSeriesResult>> {
        let results = try_join_all(self.dependencies.iter().map(|dep| dep.execute(ctx))).await?;
        let results: HashMap<StageId, Arc<TimeSeriesResult>> = self
            .dependencies
            .iter()
            .map(|dep| dep.id)
            .zip(results)
            .collect();

        let result = self.execute_with_dependencies(ctx, &results).await?;
        debug!(
            stage = %self.id,
            kind = self.kind.name(),
            queries = result.response().queries.len(),
            "Stage completed"
        );
        Ok(Arc::new(result))
    }

    async fn execute_with_dependencies(
        &self,
        ctx: &ExecutionContext,
        results: &HashMap<StageId, Arc<TimeSeriesResult>>,
    ) -> MqlResult<TimeSeriesResult> {
        match &self.kind {
            ExecutionKind::Select(query) => select::fetch(ctx.client.as_ref(), query).await,
            ExecutionKind::Union => Ok(union::combine(&self.ordered(results)?)),
            ExecutionKind::Threshold(alert) => alert.evaluate(&self.ordered(results)?),
        }
    }

    /// Dependency results in declared order
    fn ordered(
        &self,
        results: &HashMap<StageId, Arc<TimeSeriesResult>>,
    ) -> MqlResult<Vec<Arc<TimeSeriesResult>>> {
        self.dependencies
            .iter()
            .map(|dep| {
                results.get(&dep.id).cloned().ok_or_else(|| {
                    MqlError::Evaluation(format!("missing result for stage {}", dep.id))
                })
            })
            .collect()
    }
}

/// State shared by all nodes during one statement execution
pub struct ExecutionContext {
    client: Arc<dyn QueryClient>,
    memo: Mutex<HashMap<StageId, Arc<OnceCell<Arc<TimeSeriesResult>>>>>,
}

impl ExecutionContext {
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self {
            client,
            memo: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, id: StageId) -> Arc<OnceCell<Arc<TimeSeriesResult>>> {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(memo.entry(id).or_default())
    }
}
