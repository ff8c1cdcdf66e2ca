use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{job_to_payload, parse_job_id};
use crate::{error::ApiError, state::AppState};

/// POST /jobs/{id}/requeue
/// Push a still-queued job back onto the queue, e.g. after an enqueue failure.
pub async fn requeue_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.dispatcher.requeue(id).await?;
    Ok((StatusCode::ACCEPTED, Json(job_to_payload(&job))))
}
