//! Query error types
//!
//! Defines all error conditions that can occur while parsing, compiling and
//! executing an MQL statement.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::kairos::{KairosError, ValidationError};
use crate::query::ast::Position;
use crate::query::literal::LiteralError;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum MqlError {
    /// Statement text is malformed
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Statement is well-formed but cannot be turned into a plan
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The backend call of a select stage failed
    #[error("Remote query failed: {0}")]
    Remote(#[from] KairosError),

    /// Alert evaluation hit a value it could not compare
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The statement deadline elapsed before the result was ready
    #[error("Statement timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl MqlError {
    /// Individual problem messages, one per entry
    pub fn problems(&self) -> Vec<String> {
        match self {
            MqlError::Syntax(e) => e.problems.iter().map(ToString::to_string).collect(),
            MqlError::Compile(CompileError::InvalidArguments {
                aggregator,
                problems,
            }) => problems
                .iter()
                .map(|p| format!("{}: {}", aggregator, p))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type for query operations
pub type MqlResult<T> = Result<T, MqlError>;

/// One syntax problem, located by 1-based line and column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxProblem {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Problem at line {}, character {}: {}",
            self.line, self.column, self.message
        )
    }
}

/// Malformed MQL text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Syntax error: {}", join(problems))]
pub struct SyntaxError {
    pub problems: Vec<SyntaxProblem>,
}

impl SyntaxError {
    pub fn single(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            problems: vec![SyntaxProblem {
                line,
                column,
                message: message.into(),
            }],
        }
    }
}

/// Failures while binding a parse tree into an execution plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("statement contains no stages")]
    EmptyStatement,

    #[error("stage '{name}' is already defined ({position})")]
    DuplicateStage { name: String, position: Position },

    #[error("stage '{name}' does not exist ({position})")]
    UndefinedReference { name: String, position: Position },

    #[error("unknown aggregator '{name}' ({position})")]
    UnknownAggregator { name: String, position: Position },

    #[error("aggregator '{name}' must be applied to exactly one select stage ({position})")]
    NotLiftable { name: String, position: Position },

    #[error("aggregator '{name}' has no stages to aggregate ({position})")]
    NoDependencies { name: String, position: Position },

    #[error("invalid arguments to '{aggregator}': {}", join(problems))]
    InvalidArguments {
        aggregator: String,
        problems: Vec<ArgumentProblem>,
    },

    #[error("invalid time at {position}: {source}")]
    InvalidTime {
        position: Position,
        source: LiteralError,
    },

    #[error("invalid select at {position}: {source}")]
    InvalidQuery {
        position: Position,
        source: ValidationError,
    },
}

/// One problem with the keyword arguments of an aggregation stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgumentProblem {
    #[error("missing required argument '{field}'")]
    Missing { field: &'static str },

    #[error("argument '{field}' must be a {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument '{field}' {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("argument '{field}' given more than once")]
    Duplicate { field: String },
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::single(2, 7, "expected stage");
        assert_eq!(
            err.to_string(),
            "Syntax error: Problem at line 2, character 7: expected stage"
        );
    }

    #[test]
    fn test_undefined_reference_mentions_does_not_exist() {
        let err = CompileError::UndefinedReference {
            name: "sel".to_string(),
            position: Position { line: 1, column: 20 },
        };
        assert!(err.to_string().contains("does not exist"));
        assert!(err.to_string().contains("'sel'"));
    }

    #[test]
    fn test_argument_problems_are_listed_individually() {
        let err = MqlError::from(CompileError::InvalidArguments {
            aggregator: "threshold".to_string(),
            problems: vec![
                ArgumentProblem::Missing { field: "threshold" },
                ArgumentProblem::Missing { field: "operator" },
            ],
        });

        assert_eq!(
            err.problems(),
            vec![
                "threshold: missing required argument 'threshold'",
                "threshold: missing required argument 'operator'",
            ]
        );
        assert!(err.to_string().contains("'operator'"));
    }
}
