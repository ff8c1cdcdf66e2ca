use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{job_to_payload, parse_job_id};
use crate::{error::ApiError, state::AppState};

/// GET /jobs/{id}
pub async fn get_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.dispatcher.get_status(id).await?;
    Ok(Json(job_to_payload(&job)))
}
