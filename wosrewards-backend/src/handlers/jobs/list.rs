use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use serde_json::{json, Value};

use crate::handlers::utils::{job_to_payload, parse_positive_usize};
use crate::{error::ApiError, state::AppState};

/// GET /jobs
/// List jobs, most recent first, with pagination.
pub async fn list_jobs(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = parse_positive_usize(params.get("page"), 1, "page")?;
    let per_page = parse_positive_usize(params.get("perPage"), 20, "perPage")?;
    let offset = (page - 1).saturating_mul(per_page);

    let total = state.dispatcher.count_jobs().await?;
    let jobs = state.dispatcher.list_jobs(per_page, offset).await?;
    let items: Vec<Value> = jobs.iter().map(job_to_payload).collect();

    Ok(Json(json!({
        "items": items,
        "pagination": {
            "page": page,
            "perPage": per_page,
            "total": total,
        }
    })))
}
