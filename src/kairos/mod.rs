//! KairosDB Integration
//!
//! The remote time-series backend that compiled MQL stages query.
//!
//! - **models**: wire types for `POST /api/v1/datapoints/query`
//! - **client**: the [`QueryClient`] seam and its reqwest implementation

mod client;
mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{KairosConfig, KairosDbClient, KairosError, QueryClient, METRICS_QUERY_PATH};
pub use models::{
    Aggregator, DataPoint, GroupBy, Metric, MetricsQuery, MetricsQueryResponse, Query,
    QueryResult, Sampling, SamplingUnit, TagMultimap, ValidationError,
};
