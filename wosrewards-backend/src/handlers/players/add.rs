use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayerRequest {
    pub player_id: String,
}

/// POST /players
/// Registers a player id. Re-adding a known id is not an error.
pub async fn add_player(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: AddPlayerRequest = serde_json::from_value(body)?;
    let player_id = request.player_id.trim().to_owned();
    let added = state.players.add_player(&player_id).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({ "playerId": player_id, "added": added }))))
}
