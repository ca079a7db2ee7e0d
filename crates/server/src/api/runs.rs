//! Run status handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketsync_core::RunRecord;
use uuid::Uuid;

use crate::state::AppState;

/// Maximum allowed limit for run queries
const MAX_LIMIT: usize = 1000;

/// Default limit for run queries
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListRunsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<RunRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub error: String,
}

/// List recent runs, newest first
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRunsParams>,
) -> Json<ListRunsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let runs = state.dispatcher().tracker().list(limit).await;
    Json(ListRunsResponse {
        count: runs.len(),
        runs,
    })
}

/// Get a single run
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunRecord>, impl IntoResponse> {
    let Ok(run_id) = Uuid::parse_str(&id) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(RunErrorResponse {
                error: format!("Invalid run id: {}", id),
            }),
        ));
    };

    match state.dispatcher().tracker().get(run_id).await {
        Some(record) => Ok(Json(record)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(RunErrorResponse {
                error: format!("Run not found: {}", run_id),
            }),
        )),
    }
}
