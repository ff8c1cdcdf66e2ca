use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::handlers::{jobs, players, utils::JOBS_DATA_ROUTE};
use crate::state::AppState;

// Requests carry at most a list of player ids.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Build the primary axum router with the provided shared application state.
///
/// Every route lives under `/api`; job artifacts are served read-only from
/// the output root at `/api/jobs_data`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let artifacts = ServeDir::new(&state.output_root);

    let router = Router::new()
        .route("/jobs", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/requeue", post(jobs::requeue_job))
        .route("/players", get(players::list_players).post(players::add_player))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest_service(JOBS_DATA_ROUTE, artifacts)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(Extension(state));

    Router::new().nest("/api", router)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness: the database must answer a trivial query.
async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(state.db_pool.as_ref()).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(error) => {
            tracing::warn!(%error, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
