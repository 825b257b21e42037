//! Threshold alert evaluation
//!
//! Scans every datapoint of every dependency result and emits an
//! [`AlertTrigger`] for each one that satisfies `operator(value, threshold)`.
//! The stage's own response is the union of its dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::result::{AlertTrigger, TimeSeriesResult};
use super::union;
use crate::query::error::{MqlError, MqlResult};

/// Comparison between a datapoint value and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdOperator {
    EqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl ThresholdOperator {
    pub const ALL: [ThresholdOperator; 5] = [
        Self::EqualTo,
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
        Self::LessThan,
        Self::LessThanOrEqualTo,
    ];

    /// Parse an operator name, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EqualTo => "EQUAL_TO",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
        }
    }

    /// Whether `value` satisfies the operator against `threshold`
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::EqualTo => (value - threshold).abs() < f64::EPSILON,
            Self::GreaterThan => value > threshold,
            Self::GreaterThanOrEqualTo => value >= threshold,
            Self::LessThan => value < threshold,
            Self::LessThanOrEqualTo => value <= threshold,
        }
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a datapoint whose value is not a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonNumericPolicy {
    /// Ignore the point and report a warning
    #[default]
    Skip,
    /// Abort the statement
    Fail,
}

impl NonNumericPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Configuration of a threshold stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdAlert {
    pub threshold: f64,
    pub operator: ThresholdOperator,
    pub non_numeric: NonNumericPolicy,
}

impl ThresholdAlert {
    pub fn new(threshold: f64, operator: ThresholdOperator) -> Self {
        Self {
            threshold,
            operator,
            non_numeric: NonNumericPolicy::default(),
        }
    }

    /// Evaluate over dependency results given in declared order
    pub fn evaluate(&self, results: &[Arc<TimeSeriesResult>]) -> MqlResult<TimeSeriesResult> {
        let mut triggers = Vec::new();
        let mut skipped = 0usize;

        for point in results.iter().flat_map(|r| r.response().data_points()) {
            match point.as_f64() {
                Some(value) => {
                    if self.operator.matches(value, self.threshold) {
                        triggers.push(AlertTrigger {
                            time: point.time,
                            value,
                        });
                    }
                }
                None => match self.non_numeric {
                    NonNumericPolicy::Skip => skipped += 1,
                    NonNumericPolicy::Fail => {
                        return Err(MqlError::Evaluation(format!(
                            "non-numeric value {} at {}",
                            point.value,
                            point.time.to_rfc3339()
                        )));
                    }
                },
            }
        }

        debug!(
            operator = %self.operator,
            threshold = self.threshold,
            triggers = triggers.len(),
            "Threshold evaluated"
        );

        let mut warnings = Vec::new();
        if skipped > 0 {
            warn!(skipped, "Skipped non-numeric datapoints during threshold evaluation");
            warnings.push(format!(
                "threshold skipped {} non-numeric datapoint(s)",
                skipped
            ));
        }

        Ok(union::combine(results)
            .with_warnings(warnings)
            .with_alerts(triggers))
    }
}
