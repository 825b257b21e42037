//! MQL Parse Tree
//!
//! The parser's output: an ordered list of stage declarations. Every stage is
//! either a `select` against the backend or an aggregation over earlier
//! stages.
//!
//! # Example Statements
//!
//! ```text
//! select cpu from 2h ago to now where host = "h1"
//! a = select cpu where host = "h1", "h2"; b = max(of a)
//! cpu = select cpu; mem = select mem; union(of (cpu, mem))
//! ```

use chrono::{DateTime, Utc};
use std::fmt;

/// A full statement: stages separated by `;`
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub stages: Vec<Stage>,
}

/// Line/column of a stage in the source text, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// One stage declaration, optionally bound to a name
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Name from `name = ...`, if any
    pub binding: Option<String>,
    pub kind: StageKind,
    pub position: Position,
}

/// The kinds of stage the language has
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    Select(SelectStage),
    Aggregation(AggregationStage),
}

/// `select <metric> [from .. [to ..]] [where ..] [group by ..]`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStage {
    pub metric: String,
    pub time_range: Option<TimeRangeExpr>,
    pub filters: Vec<TagFilter>,
    pub group_by: Vec<String>,
}

impl SelectStage {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            time_range: None,
            filters: Vec::new(),
            group_by: Vec::new(),
        }
    }
}

/// `from <time> [to <time>]`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRangeExpr {
    pub from: TimeExpr,
    /// Defaults to `now` when omitted
    pub to: Option<TimeExpr>,
}

/// A point in time as written in a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeExpr {
    /// `now`
    Now,
    /// `<amount> <unit> ago`
    Ago { amount: u32, unit: TimeUnit },
    /// A quoted date-time, already parsed
    Absolute(DateTime<Utc>),
}

/// Units accepted in relative time expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    /// Calendar month, not a fixed duration
    Month,
}

impl TimeUnit {
    /// Parse a unit word or abbreviation, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Self::Second),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minute),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hour),
            "d" | "day" | "days" => Some(Self::Day),
            "w" | "week" | "weeks" => Some(Self::Week),
            "mo" | "month" | "months" => Some(Self::Month),
            _ => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Second => write!(f, "seconds"),
            Self::Minute => write!(f, "minutes"),
            Self::Hour => write!(f, "hours"),
            Self::Day => write!(f, "days"),
            Self::Week => write!(f, "weeks"),
            Self::Month => write!(f, "months"),
        }
    }
}

/// `<tag> = <value>, <value>...`
#[derive(Debug, Clone, PartialEq)]
pub struct TagFilter {
    pub key: String,
    pub values: Vec<String>,
}

/// `<name>([of <refs>] [, key=value ...])`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationStage {
    /// Aggregator name, lowercased
    pub name: String,
    /// Explicit `of` references; `None` means "the previous stage"
    pub sources: Option<Vec<String>>,
    /// Keyword arguments in source order
    pub arguments: Vec<Argument>,
}

/// A `key=value` argument of an aggregation stage
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub key: String,
    pub value: ArgValue,
}

/// Literal values allowed as arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Number(f64),
    String(String),
    Bool(bool),
    /// A bare word such as `GREATER_THAN`
    Identifier(String),
}

impl ArgValue {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Identifier(_) => "identifier",
        }
    }

    /// Text of a string or identifier
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Identifier(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Identifier(s) => write!(f, "{}", s),
        }
    }
}
