//! Stage results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::kairos::{MetricsQueryResponse, Query};

/// A datapoint that satisfied a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTrigger {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Output of one stage: backend payload plus everything noticed on the way.
///
/// Shared behind an `Arc` once produced; the builder methods consume `self`
/// so a result is never changed after it is handed to another stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    response: MetricsQueryResponse,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alerts: Vec<AlertTrigger>,
}

impl TimeSeriesResult {
    pub fn new(response: MetricsQueryResponse) -> Self {
        Self {
            response,
            ..Default::default()
        }
    }

    /// Concatenate the queries of `results` in the order given, carrying
    /// over their warnings, errors and alerts. Extra response fields keep
    /// the first value seen for each key.
    pub fn concat<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a TimeSeriesResult>,
    {
        let mut queries: Vec<Query> = Vec::new();
        let mut other = Map::new();
        let mut combined = Self::default();

        for result in results {
            queries.extend(result.response.queries.iter().cloned());
            for (key, value) in &result.response.other {
                other.entry(key.clone()).or_insert_with(|| value.clone());
            }
            combined.warnings.extend(result.warnings.iter().cloned());
            combined.errors.extend(result.errors.iter().cloned());
            combined.alerts.extend(result.alerts.iter().cloned());
        }

        combined.response = MetricsQueryResponse { queries, other };
        combined
    }

    pub fn response(&self) -> &MetricsQueryResponse {
        &self.response
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn alerts(&self) -> &[AlertTrigger] {
        &self.alerts
    }

    pub fn with_warnings<I: IntoIterator<Item = String>>(mut self, warnings: I) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors<I: IntoIterator<Item = String>>(mut self, errors: I) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_alerts<I: IntoIterator<Item = AlertTrigger>>(mut self, alerts: I) -> Self {
        self.alerts.extend(alerts);
        self
    }
}
