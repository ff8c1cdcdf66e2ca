use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::handlers::utils::job_to_payload;
use crate::{error::ApiError, state::AppState};

/// Player ids arrive either as a list or as one string separated by commas
/// or whitespace. Only the string form is split.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PlayerIds {
    List(Vec<String>),
    Text(String),
}

impl PlayerIds {
    fn into_vec(self) -> Vec<String> {
        match self {
            PlayerIds::List(ids) => ids,
            PlayerIds::Text(raw) => raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub player_ids: PlayerIds,
}

/// POST /jobs
pub async fn submit_job(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: SubmitJobRequest = serde_json::from_value(body)?;
    let job = state.dispatcher.submit(request.player_ids.into_vec()).await?;
    Ok((StatusCode::CREATED, Json(job_to_payload(&job))))
}
