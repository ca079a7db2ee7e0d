//! Workflow webhook handler.
//!
//! The automation platform posts `{"object":{"objectId":...}}` for each
//! contact event and expects `{"outputFields":{}}` once the action is done.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use ticketsync_core::{ContactEvent, Dispatched, WorkflowError, WorkflowResponse, WorkflowStage};
use tracing::{info, warn};
use uuid::Uuid;

use super::middleware::AuthCaller;
use crate::state::AppState;

/// Response header carrying the run id in await mode.
pub const RUN_ID_HEADER: &str = "x-run-id";

/// Returned immediately in background mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub output_fields: serde_json::Map<String, serde_json::Value>,
    pub run_id: Uuid,
}

/// Returned when an awaited run fails.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowErrorResponse {
    pub error: String,
    pub stage: WorkflowStage,
    pub retryable: bool,
    pub run_id: Uuid,
}

/// Status the host sees for a failed run.
///
/// 503 asks the host to retry the event; 502 reports a failure that a
/// retry would not fix or would make worse.
pub fn error_status(error: &WorkflowError) -> StatusCode {
    if error.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Handle a contact event
pub async fn contact_event(
    State(state): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Json(event): Json<ContactEvent>,
) -> Response {
    info!(
        "Contact event for object {} from {}",
        event.contact_id(),
        caller
    );

    match state.dispatcher().dispatch(event).await {
        Dispatched::Completed {
            run_id,
            result: Ok(_),
        } => {
            let mut response = Json(WorkflowResponse::default()).into_response();
            if let Ok(value) = HeaderValue::from_str(&run_id.to_string()) {
                response.headers_mut().insert(RUN_ID_HEADER, value);
            }
            response
        }
        Dispatched::Completed {
            run_id,
            result: Err(e),
        } => {
            let status = error_status(&e);
            warn!(
                "Run {} answered {} (stage: {})",
                run_id,
                status,
                e.stage().as_str()
            );
            (
                status,
                Json(WorkflowErrorResponse {
                    error: e.to_string(),
                    stage: e.stage(),
                    retryable: e.is_retryable(),
                    run_id,
                }),
            )
                .into_response()
        }
        Dispatched::Spawned { run_id, .. } => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                output_fields: serde_json::Map::new(),
                run_id,
            }),
        )
            .into_response(),
    }
}
