//! Query Compiler
//!
//! Binds a parsed [`Statement`] into a graph of [`StageExecution`] nodes.
//!
//! Stages are walked in declaration order. Selects become remote queries,
//! aggregations become nodes over earlier stages. An aggregation the backend
//! can compute itself (see [`registry::is_liftable`]) over a single select is
//! folded into that select's metric instead of becoming a node: the plan
//! makes one round trip where it would otherwise make two. When the select
//! already feeds an earlier stage, the aggregator goes into a copy of it.
//!
//! The last stage is the terminal node. Stages it does not reach are
//! dropped from the plan.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::kairos::{GroupBy, Metric, MetricsQuery};
use crate::query::ast::{
    AggregationStage, Position, SelectStage, Statement, StageKind, TimeExpr, TimeRangeExpr,
};
use crate::query::error::CompileError;
use crate::query::execution::{ExecutionKind, StageExecution, StageId, ThresholdAlert};
use crate::query::literal::resolve_time;
use crate::query::registry::{self, AggregatorRegistry};

/// Range used by selects before any explicit `from`
const DEFAULT_LOOKBACK_HOURS: i64 = 2;

/// A statement ready to execute
#[derive(Debug, PartialEq)]
pub struct CompiledStatement {
    terminal: Arc<StageExecution>,
    warnings: Vec<String>,
}

impl CompiledStatement {
    /// Node whose result is the statement's result
    pub fn terminal(&self) -> &Arc<StageExecution> {
        &self.terminal
    }

    /// Non-fatal problems found while compiling
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Describe the plan without running it
    pub fn explain(&self) -> PlanDescription {
        let mut reachable: BTreeMap<StageId, &StageExecution> = BTreeMap::new();
        let mut pending: Vec<&StageExecution> = vec![self.terminal.as_ref()];
        while let Some(stage) = pending.pop() {
            if reachable.insert(stage.id(), stage).is_none() {
                pending.extend(stage.dependencies().iter().map(|dep| &**dep));
            }
        }

        let stages = reachable
            .into_values()
            .map(|stage| StageDescription {
                id: stage.id(),
                name: stage.name().map(String::from),
                kind: stage.kind().name(),
                dependencies: stage.dependencies().iter().map(|d| d.id()).collect(),
                query: match stage.kind() {
                    ExecutionKind::Select(query) => Some(query.clone()),
                    _ => None,
                },
                threshold: match stage.kind() {
                    ExecutionKind::Threshold(alert) => Some(*alert),
                    _ => None,
                },
            })
            .collect();

        PlanDescription {
            terminal: self.terminal.id(),
            stages,
            warnings: self.warnings.clone(),
        }
    }
}

/// Serializable view of a compiled plan, dependencies first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDescription {
    pub terminal: StageId,
    pub stages: Vec<StageDescription>,
    pub warnings: Vec<String>,
}

/// One node of a [`PlanDescription`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDescription {
    pub id: StageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: &'static str,
    pub dependencies: Vec<StageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<MetricsQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdAlert>,
}

/// Plan node while the graph is still being built
struct PlanNode {
    name: Option<String>,
    dependencies: Vec<usize>,
    kind: ExecutionKind,
    position: Position,
}

/// Compiles statements against a set of registered aggregators
pub struct Compiler<'r> {
    registry: &'r AggregatorRegistry,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r AggregatorRegistry) -> Self {
        Self { registry }
    }

    /// Compile with relative times resolved against the current time
    pub fn compile(&self, statement: &Statement) -> Result<CompiledStatement, CompileError> {
        self.compile_at(statement, Utc::now())
    }

    /// Compile with relative times resolved against `now`
    pub fn compile_at(
        &self,
        statement: &Statement,
        now: DateTime<Utc>,
    ) -> Result<CompiledStatement, CompileError> {
        let mut binder = Binder {
            registry: self.registry,
            now,
            range: (now - Duration::hours(DEFAULT_LOOKBACK_HOURS), now),
            nodes: Vec::new(),
            bindings: HashMap::new(),
            previous: None,
            warnings: Vec::new(),
        };

        for stage in &statement.stages {
            if let Some(name) = &stage.binding {
                if binder.bindings.contains_key(name) {
                    return Err(CompileError::DuplicateStage {
                        name: name.clone(),
                        position: stage.position,
                    });
                }
            }

            let node = match &stage.kind {
                StageKind::Select(select) => binder.bind_select(select, stage.position)?,
                StageKind::Aggregation(aggregation) => {
                    binder.bind_aggregation(aggregation, stage.position)?
                }
            };

            if let Some(name) = &stage.binding {
                binder.bindings.insert(name.clone(), node);
                if binder.nodes[node].name.is_none() {
                    binder.nodes[node].name = Some(name.clone());
                }
            }
            binder.previous = Some(node);
        }

        let terminal = binder.previous.ok_or(CompileError::EmptyStatement)?;
        binder.validate()?;

        let compiled = binder.freeze(terminal);
        debug!(
            stages = statement.stages.len(),
            terminal = %compiled.terminal.id(),
            warnings = compiled.warnings.len(),
            "Statement compiled"
        );
        Ok(compiled)
    }
}

/// State of one compile call
struct Binder<'r> {
    registry: &'r AggregatorRegistry,
    now: DateTime<Utc>,
    /// Most recent explicit time range
    range: (DateTime<Utc>, DateTime<Utc>),
    nodes: Vec<PlanNode>,
    bindings: HashMap<String, usize>,
    previous: Option<usize>,
    warnings: Vec<String>,
}

impl<'r> Binder<'r> {
    fn bind_select(&mut self, select: &SelectStage, position: Position) -> Result<usize, CompileError> {
        if let Some(range) = &select.time_range {
            self.range = self.resolve_range(range, position)?;
        }
        let (start, end) = self.range;

        let mut metric = Metric::new(select.metric.clone());
        for filter in &select.filters {
            metric.tags.extend(filter.key.clone(), filter.values.iter().cloned());
        }
        if !select.group_by.is_empty() {
            metric = metric.group_by(GroupBy::tags(select.group_by.iter().cloned()));
        }

        let query = MetricsQuery::new(start, end, vec![metric]);
        Ok(self.push(ExecutionKind::Select(query), Vec::new(), position))
    }

    fn resolve_range(
        &self,
        range: &TimeRangeExpr,
        position: Position,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CompileError> {
        let resolve = |expr: &TimeExpr| {
            resolve_time(expr, self.now).map_err(|source| CompileError::InvalidTime { position, source })
        };
        let start = resolve(&range.from)?;
        let end = resolve(range.to.as_ref().unwrap_or(&TimeExpr::Now))?;
        Ok((start, end))
    }

    fn bind_aggregation(
        &mut self,
        aggregation: &AggregationStage,
        position: Position,
    ) -> Result<usize, CompileError> {
        let dependencies = self.dependencies(aggregation, position)?;
        let name = aggregation.name.as_str();

        if registry::is_liftable(name) {
            if let Some(target) = self.lift_target(&dependencies) {
                return self.lift(aggregation, target, position);
            }
        }

        let decoded = self
            .registry
            .decode(name, &aggregation.arguments)
            .ok_or_else(|| {
                if registry::is_liftable(name) {
                    CompileError::NotLiftable {
                        name: name.to_string(),
                        position,
                    }
                } else {
                    CompileError::UnknownAggregator {
                        name: name.to_string(),
                        position,
                    }
                }
            })??;
        self.warnings.extend(decoded.warnings);

        Ok(self.push(decoded.value, dependencies, position))
    }

    /// Explicit `of` references, or the previous stage
    fn dependencies(
        &self,
        aggregation: &AggregationStage,
        position: Position,
    ) -> Result<Vec<usize>, CompileError> {
        let dependencies = match &aggregation.sources {
            Some(sources) => sources
                .iter()
                .map(|source| {
                    self.bindings.get(source).copied().ok_or_else(|| {
                        CompileError::UndefinedReference {
                            name: source.clone(),
                            position,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => self.previous.into_iter().collect(),
        };

        if dependencies.is_empty() {
            return Err(CompileError::NoDependencies {
                name: aggregation.name.clone(),
                position,
            });
        }
        Ok(dependencies)
    }

    /// The single select a backend aggregator can be folded into
    fn lift_target(&self, dependencies: &[usize]) -> Option<usize> {
        match dependencies {
            [single] if matches!(self.nodes[*single].kind, ExecutionKind::Select(_)) => {
                Some(*single)
            }
            _ => None,
        }
    }

    /// Fold a backend aggregator into the select it reads from.
    ///
    /// A select that already feeds another stage keeps its meaning for that
    /// stage: the aggregated query goes into a copy of it instead.
    fn lift(
        &mut self,
        aggregation: &AggregationStage,
        target: usize,
        position: Position,
    ) -> Result<usize, CompileError> {
        let decoded = registry::decode_lifted(&aggregation.name, &aggregation.arguments)?;
        self.warnings.extend(decoded.warnings);

        let consumed = self
            .nodes
            .iter()
            .any(|node| node.dependencies.contains(&target));
        let node = if consumed {
            let kind = self.nodes[target].kind.clone();
            self.push(kind, Vec::new(), position)
        } else {
            target
        };

        if let ExecutionKind::Select(query) = &mut self.nodes[node].kind {
            for metric in &mut query.metrics {
                metric.aggregators.push(decoded.value.clone());
            }
        }

        debug!(
            aggregator = %aggregation.name,
            stage = node,
            copied = consumed,
            "Lifted aggregator into select"
        );
        Ok(node)
    }

    fn push(&mut self, kind: ExecutionKind, dependencies: Vec<usize>, position: Position) -> usize {
        self.nodes.push(PlanNode {
            name: None,
            dependencies,
            kind,
            position,
        });
        self.nodes.len() - 1
    }

    fn validate(&self) -> Result<(), CompileError> {
        for node in &self.nodes {
            if let ExecutionKind::Select(query) = &node.kind {
                query.validate().map_err(|source| CompileError::InvalidQuery {
                    position: node.position,
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Turn the arena into shared nodes. Dependencies always precede their
    /// dependents, so one forward pass is enough.
    fn freeze(self, terminal: usize) -> CompiledStatement {
        let mut frozen: Vec<Arc<StageExecution>> = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.into_iter().enumerate() {
            let dependencies = node
                .dependencies
                .iter()
                .map(|&dep| Arc::clone(&frozen[dep]))
                .collect();
            frozen.push(Arc::new(StageExecution::new(
                StageId(index),
                node.name,
                dependencies,
                node.kind,
            )));
        }

        CompiledStatement {
            terminal: Arc::clone(&frozen[terminal]),
            warnings: self.warnings,
        }
    }
}
