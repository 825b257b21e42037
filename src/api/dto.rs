//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Query results are
//! returned as [`crate::query::TimeSeriesResult`] and plans as
//! [`crate::query::PlanDescription`] directly.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/query` and `POST /api/v1/query/explain`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// MQL statement text
    pub query: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
    pub request_id: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub kairosdb: String,
    pub statement_timeout_ms: u64,
    pub aggregators: Vec<String>,
}
