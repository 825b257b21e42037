//! KairosDB wire models
//!
//! Request and response bodies for `POST /api/v1/datapoints/query`.
//!
//! Request values are plain immutable data; [`MetricsQuery::validate`] is the
//! separate pass that reports every violation at once. Response types keep
//! any field they do not model in an `other` map so nothing the backend sends
//! is dropped on the way through.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

// ============================================
// Request
// ============================================

/// A query against the backend: one time range, one or more metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsQuery {
    /// Inclusive start of the range
    #[serde(rename = "start_absolute", with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    /// Inclusive end of the range
    #[serde(rename = "end_absolute", with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// Metrics to fetch, never empty once validated
    pub metrics: Vec<Metric>,
}

impl MetricsQuery {
    /// Create a query over `[start, end]`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, metrics: Vec<Metric>) -> Self {
        Self {
            start,
            end,
            metrics,
        }
    }

    /// Check the query and report every problem found
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        if self.start > self.end {
            problems.push(format!(
                "start {} is after end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            ));
        }

        if self.metrics.is_empty() {
            problems.push("query must contain at least one metric".to_string());
        }

        for (index, metric) in self.metrics.iter().enumerate() {
            if metric.name.trim().is_empty() {
                problems.push(format!("metric #{} has an empty name", index));
            }
            for aggregator in &metric.aggregators {
                if aggregator.name.trim().is_empty() {
                    problems.push(format!(
                        "metric '{}' has an aggregator with an empty name",
                        metric.name
                    ));
                }
            }
            for group_by in &metric.group_by {
                if group_by.name.trim().is_empty() {
                    problems.push(format!(
                        "metric '{}' has a group_by with an empty name",
                        metric.name
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}

/// One metric inside a [`MetricsQuery`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default, skip_serializing_if = "TagMultimap::is_empty")]
    pub tags: TagMultimap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregators: Vec<Aggregator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupBy>,
}

impl Metric {
    /// Create a metric with no filters, aggregators or grouping
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: TagMultimap::new(),
            aggregators: Vec::new(),
            group_by: Vec::new(),
        }
    }

    /// Builder method: add a tag filter value
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    /// Builder method: append an aggregator
    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregators.push(aggregator);
        self
    }

    /// Builder method: append a group-by
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by.push(group_by);
        self
    }
}

/// Tag filters: key to ordered values, keys kept in insertion order.
///
/// Serialized as a JSON object `{"key": ["v1", "v2"]}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMultimap {
    entries: Vec<(String, Vec<String>)>,
}

impl TagMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`; duplicate values are kept
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Append several values under `key`
    pub fn extend<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((key, values)),
        }
    }

    /// Values for `key`, in insertion order
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for TagMultimap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TagMultimap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagVisitor;

        impl<'de> Visitor<'de> for TagVisitor {
            type Value = TagMultimap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of tag names to lists of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TagMultimap, A::Error> {
                let mut tags = TagMultimap::new();
                while let Some((key, values)) = access.next_entry::<String, Vec<String>>()? {
                    tags.extend(key, values);
                }
                Ok(tags)
            }
        }

        deserializer.deserialize_map(TagVisitor)
    }
}

/// A server-side aggregator applied to a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregator {
    pub name: String,
    #[serde(default = "default_align_sampling")]
    pub align_sampling: bool,
    #[serde(default)]
    pub sampling: Sampling,
    /// Only used by the `percentile` aggregator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

fn default_align_sampling() -> bool {
    true
}

impl Aggregator {
    /// Create an aggregator with aligned one-minute sampling
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            align_sampling: default_align_sampling(),
            sampling: Sampling::default(),
            percentile: None,
        }
    }
}

/// Sampling window of an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampling {
    pub unit: SamplingUnit,
    pub value: NonZeroU32,
}

impl Sampling {
    pub fn new(unit: SamplingUnit, value: NonZeroU32) -> Self {
        Self { unit, value }
    }
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            unit: SamplingUnit::Minutes,
            value: NonZeroU32::MIN,
        }
    }
}

/// Units understood by the backend for sampling windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl SamplingUnit {
    /// Parse a unit name, singular or plural, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "millisecond" | "milliseconds" => Some(Self::Milliseconds),
            "second" | "seconds" => Some(Self::Seconds),
            "minute" | "minutes" => Some(Self::Minutes),
            "hour" | "hours" => Some(Self::Hours),
            "day" | "days" => Some(Self::Days),
            "week" | "weeks" => Some(Self::Weeks),
            "month" | "months" => Some(Self::Months),
            "year" | "years" => Some(Self::Years),
            _ => None,
        }
    }
}

impl fmt::Display for SamplingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        };
        f.write_str(name)
    }
}

/// A grouping directive: a name plus free-form parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub name: String,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl GroupBy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
        }
    }

    /// Group by the given tag names
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("tag").parameter(
            "tags",
            Value::Array(tags.into_iter().map(|t| Value::String(t.into())).collect()),
        )
    }

    /// Builder method: set a parameter
    pub fn parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// All problems found by [`MetricsQuery::validate`]
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid query: {}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

// ============================================
// Response
// ============================================

/// Response body of a datapoints query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsQueryResponse {
    /// One entry per requested metric
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl MetricsQueryResponse {
    pub fn new(queries: Vec<Query>) -> Self {
        Self {
            queries,
            other: Map::new(),
        }
    }

    /// Iterate every datapoint of every result of every query
    pub fn data_points(&self) -> impl Iterator<Item = &DataPoint> {
        self.queries
            .iter()
            .flat_map(|q| q.results.iter())
            .flat_map(|r| r.values.iter())
    }
}

/// Results for one metric of the request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub sample_size: u64,
    #[serde(default)]
    pub results: Vec<QueryResult>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Query {
    pub fn new(results: Vec<QueryResult>) -> Self {
        let sample_size = results.iter().map(|r| r.values.len() as u64).sum();
        Self {
            sample_size,
            results,
            other: Map::new(),
        }
    }
}

/// One series within a [`Query`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub values: Vec<DataPoint>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl QueryResult {
    pub fn new(values: Vec<DataPoint>) -> Self {
        Self {
            values,
            other: Map::new(),
        }
    }

    /// Metric name as echoed by the backend, if present
    pub fn name(&self) -> Option<&str> {
        self.other.get("name").and_then(Value::as_str)
    }
}

/// A single sample. On the wire: `[epoch_millis, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    /// Usually a number; the backend may also return strings or objects
    pub value: Value,
}

impl DataPoint {
    pub fn new(time: DateTime<Utc>, value: impl Into<Value>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }

    /// Numeric value, if the sample holds one
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

impl Serialize for DataPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.time.timestamp_millis(), &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (millis, value) = <(i64, Value)>::deserialize(deserializer)?;
        let time = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| de::Error::custom(format!("timestamp {} out of range", millis)))?;
        Ok(Self { time, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_tag_multimap_round_trip() {
        let metric = Metric::new("cpu").tag("a", "x").tag("a", "y");

        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["tags"], json!({"a": ["x", "y"]}));

        let back: Metric = serde_json::from_value(json).unwrap();
        assert_eq!(back.tags.get("a").unwrap(), &["x".to_string(), "y".to_string()]);
        assert_eq!(back, metric);
    }

    #[test]
    fn test_tag_multimap_keeps_insertion_order_and_duplicates() {
        let mut tags = TagMultimap::new();
        tags.insert("zone", "b");
        tags.insert("host", "h1");
        tags.insert("zone", "b");

        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zone", "host"]);
        assert_eq!(tags.get("zone").unwrap().len(), 2);
    }

    #[test]
    fn test_query_wire_format() {
        let query = MetricsQuery::new(
            ts(1_000),
            ts(2_000),
            vec![Metric::new("cpu")
                .tag("host", "h1")
                .aggregator(Aggregator::new("max"))
                .group_by(GroupBy::tags(["host"]))],
        );

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            json!({
                "start_absolute": 1000,
                "end_absolute": 2000,
                "metrics": [{
                    "name": "cpu",
                    "tags": {"host": ["h1"]},
                    "aggregators": [{
                        "name": "max",
                        "align_sampling": true,
                        "sampling": {"unit": "minutes", "value": 1}
                    }],
                    "group_by": [{"name": "tag", "tags": ["host"]}]
                }]
            })
        );
    }

    #[test]
    fn test_zero_sampling_rejected() {
        let result: Result<Aggregator, _> = serde_json::from_value(json!({
            "name": "max",
            "align_sampling": true,
            "sampling": {"unit": "minutes", "value": 0}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_data_point_wire_form() {
        let point: DataPoint = serde_json::from_str("[1500, 6.5]").unwrap();
        assert_eq!(point.time, ts(1_500));
        assert_eq!(point.as_f64(), Some(6.5));
        assert_eq!(serde_json::to_string(&point).unwrap(), "[1500,6.5]");

        assert!(serde_json::from_str::<DataPoint>("[1500]").is_err());
        assert!(serde_json::from_str::<DataPoint>("[1500, 1, 2]").is_err());
    }

    #[test]
    fn test_response_preserves_unknown_fields() {
        let body = json!({
            "queries": [{
                "sample_size": 2,
                "results": [{
                    "name": "cpu",
                    "group_by": [{"name": "type", "type": "number"}],
                    "tags": {"host": ["h1"]},
                    "values": [[1000, 1], [2000, "n/a"]]
                }],
                "custom": true
            }],
            "trace_id": "abc"
        });

        let response: MetricsQueryResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(response.other["trace_id"], json!("abc"));
        assert_eq!(response.queries[0].other["custom"], json!(true));
        assert_eq!(response.queries[0].results[0].name(), Some("cpu"));
        assert_eq!(response.data_points().count(), 2);

        assert_eq!(serde_json::to_value(&response).unwrap(), body);
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let query = MetricsQuery::new(
            ts(2_000),
            ts(1_000),
            vec![Metric::new("").group_by(GroupBy::new(""))],
        );

        let err = query.validate().unwrap_err();
        assert_eq!(err.problems.len(), 3);

        let empty = MetricsQuery::new(ts(1_000), ts(2_000), Vec::new());
        let err = empty.validate().unwrap_err();
        assert_eq!(err.problems, vec!["query must contain at least one metric"]);
    }

    #[test]
    fn test_sampling_unit_parse() {
        assert_eq!(SamplingUnit::parse("Hour"), Some(SamplingUnit::Hours));
        assert_eq!(SamplingUnit::parse("minutes"), Some(SamplingUnit::Minutes));
        assert_eq!(SamplingUnit::parse("fortnight"), None);
    }
}
