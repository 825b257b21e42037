//! In-memory [`QueryClient`] for tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::client::{KairosError, QueryClient};
use super::models::{DataPoint, MetricsQuery, MetricsQueryResponse, Query, QueryResult};

/// Serves canned series per metric name and records every call
#[derive(Default)]
pub struct RecordingClient {
    series: HashMap<String, Vec<DataPoint>>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    calls: Mutex<Vec<MetricsQuery>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `points` (epoch millis, value) for `metric`
    pub fn with_series(mut self, metric: &str, points: Vec<(i64, Value)>) -> Self {
        let points = points
            .into_iter()
            .map(|(millis, value)| DataPoint::new(Utc.timestamp_millis_opt(millis).unwrap(), value))
            .collect();
        self.series.insert(metric.to_string(), points);
        self
    }

    /// Delay responses that include `metric`
    pub fn with_delay(mut self, metric: &str, delay: Duration) -> Self {
        self.delays.insert(metric.to_string(), delay);
        self
    }

    /// Fail any query that includes `metric`
    pub fn failing(mut self, metric: &str) -> Self {
        self.failing.insert(metric.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MetricsQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryClient for RecordingClient {
    async fn query_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<MetricsQueryResponse, KairosError> {
        self.calls.lock().unwrap().push(query.clone());

        let delay = query
            .metrics
            .iter()
            .filter_map(|m| self.delays.get(&m.name))
            .max()
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if query.metrics.iter().any(|m| self.failing.contains(&m.name)) {
            return Err(KairosError::Unavailable);
        }

        let queries = query
            .metrics
            .iter()
            .map(|metric| {
                let mut other = Map::new();
                other.insert("name".to_string(), json!(metric.name));
                let result = QueryResult {
                    values: self.series.get(&metric.name).cloned().unwrap_or_default(),
                    other,
                };
                Query::new(vec![result])
            })
            .collect();

        Ok(MetricsQueryResponse::new(queries))
    }
}
