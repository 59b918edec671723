//! Mapping of domain errors onto HTTP responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;

use datarun_api::ErrorResponse;
use datarun_core::CoreError;

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Body or query string could not be decoded.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Core(e) => match e {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::Conflict { .. } | CoreError::InvalidStateTransition { .. } => {
                    StatusCode::CONFLICT
                }
                CoreError::TaskNotFound(_) | CoreError::RunnerNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Authentication(_) => StatusCode::UNAUTHORIZED,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(status = status.as_u16(), error = %self, "Request failed");
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datarun_core::{RunnerId, TaskId, TaskStatus};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::conflict(&TaskId::new("t"), "lost"),
                StatusCode::CONFLICT,
            ),
            (CoreError::TaskNotFound(TaskId::new("t")), StatusCode::NOT_FOUND),
            (
                CoreError::RunnerNotFound(RunnerId::new("r")),
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::InvalidStateTransition {
                    from: TaskStatus::Completed,
                    to: TaskStatus::Running,
                },
                StatusCode::CONFLICT,
            ),
            (
                CoreError::Authentication("nope".into()),
                StatusCode::UNAUTHORIZED,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }
}
