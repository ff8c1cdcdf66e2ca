use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;
use wosrewards_db::RegistryError;
use wosrewards_job_queue::JobQueueError;

type SerdeJsonError = serde_json::Error;

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    JobQueue(#[from] JobQueueError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid request body: {0}")]
    SerdeJson(#[from] SerdeJsonError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::JobQueue(err) => match err {
                JobQueueError::NotFound(_) => StatusCode::NOT_FOUND,
                JobQueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                JobQueueError::AlreadyRunning(_)
                | JobQueueError::AlreadyFinished(_)
                | JobQueueError::InvalidTransition { .. } => StatusCode::CONFLICT,
                JobQueueError::StoreUnavailable(_) | JobQueueError::QueueUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            ApiError::Registry(RegistryError::EmptyPlayerId) => StatusCode::BAD_REQUEST,
            ApiError::Registry(RegistryError::Database(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SerdeJson(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_errors_map_to_statuses() {
        let cases = [
            (JobQueueError::NotFound(1), StatusCode::NOT_FOUND),
            (JobQueueError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (JobQueueError::AlreadyRunning(1), StatusCode::CONFLICT),
            (JobQueueError::AlreadyFinished(1), StatusCode::CONFLICT),
            (
                JobQueueError::QueueUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                JobQueueError::StoreUnavailable("locked".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn request_errors_are_client_errors() {
        let body = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ApiError::from(body).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::bad_request("page").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn registry_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(RegistryError::EmptyPlayerId).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
