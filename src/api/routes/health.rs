//! Health Routes
//!
//! - GET /health/live - Liveness check (process is alive)
//! - GET /health - Build and backend details

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let executor = &state.executor;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        kairosdb: state.kairosdb_url.clone(),
        statement_timeout_ms: executor.statement_timeout().as_millis() as u64,
        aggregators: executor
            .registry()
            .names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}
