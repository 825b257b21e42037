//! MQL Query Engine
//!
//! Compiles Metrics Query Language statements into a graph of execution
//! stages and runs them against a KairosDB backend:
//!
//! - **AST**: parse tree of stage declarations
//! - **Parser**: parse statement strings into the AST
//! - **Literal**: string escapes and time expressions
//! - **Compiler**: bind stages into an execution graph, lifting aggregators
//! - **Registry**: typed argument decoders per aggregator
//! - **Execution**: concurrent DAG execution, union and threshold stages
//! - **Executor**: the end-to-end entry point with a statement deadline
//!
//! # Query Language
//!
//! ```text
//! [name =] select <metric> [from <time> [to <time>]] [where <tag> = <value>, ...]
//!          [group by <tag>, ...]
//! [name =] <aggregator>([of <stage> | of (<stage>, ...)] [, key=value ...])
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use mql::query::QueryExecutor;
//!
//! let executor = QueryExecutor::new(client);
//! let result = executor
//!     .execute_str(r#"a = select cpu where host = "h1" from 2h ago; max(of a)"#)
//!     .await?;
//! ```

mod ast;
mod compiler;
mod error;
mod execution;
mod executor;
mod literal;
mod parser;
mod registry;

pub use ast::{
    AggregationStage, ArgValue, Argument, Position, SelectStage, Stage, StageKind, Statement,
    TagFilter, TimeExpr, TimeRangeExpr, TimeUnit,
};
pub use compiler::{CompiledStatement, Compiler, PlanDescription, StageDescription};
pub use error::{ArgumentProblem, CompileError, MqlError, MqlResult, SyntaxError, SyntaxProblem};
pub use execution::{
    AlertTrigger, ExecutionContext, ExecutionKind, NonNumericPolicy, StageExecution, StageId,
    ThresholdAlert, ThresholdOperator, TimeSeriesResult,
};
pub use executor::{QueryExecutor, DEFAULT_STATEMENT_TIMEOUT};
pub use literal::{parse_absolute, resolve_time, unescape, LiteralError};
pub use parser::parse_statement;
pub use registry::{
    decode_lifted, is_liftable, AggregatorRegistry, Arguments, DecodeFn, Decoded,
    LIFTABLE_AGGREGATORS,
};
