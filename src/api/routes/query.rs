//! Query Routes
//!
//! - POST /api/v1/query - Execute an MQL statement
//! - POST /api/v1/query/explain - Compile a statement and describe its plan

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::QueryRequest;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::query::{PlanDescription, TimeSeriesResult};

/// POST /api/v1/query
///
/// Execute a statement and return the combined result of its terminal stage.
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<TimeSeriesResult>> {
    let Json(req) = payload?;

    let result = state.executor.execute_str(&req.query).await?;

    Ok(Json(result))
}

/// POST /api/v1/query/explain
///
/// Compile without touching the backend.
pub async fn explain_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<PlanDescription>> {
    let Json(req) = payload?;

    let compiled = state.executor.compile(&req.query)?;

    Ok(Json(compiled.explain()))
}
