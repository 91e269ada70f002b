use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::domain::EventError;
use crate::pipeline::PipelineError;
use crate::repo::PersistenceError;

/// Errors returned from handlers.
///
/// Bodies are plain text: a failed check carries no structured error document, the delivering
/// platform only needs a non-2xx status to schedule a retry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BadEvent(#[from] EventError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] PersistenceError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadEvent(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(_) | ApiError::Store(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            // the pipeline already logged the run failure with its stage
            ApiError::Pipeline(_) => {}
            ApiError::Store(_) | ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
            }
            _ => tracing::debug!(error = %self, "Client error"),
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power_flow::SolverError;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::BadEvent(EventError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Pipeline(PipelineError::Solver(SolverError("boom".into()))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::NotFound("grids/a.json".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_pipeline_message_is_preserved() {
        let error = ApiError::Pipeline(PipelineError::Solver(SolverError(
            "KeyError: 'ext_grid'".into(),
        )));
        assert_eq!(error.to_string(), "KeyError: 'ext_grid'");
    }
}
