//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use legacymark_types::error::WorkflowError;

use super::response::{ApiErrorDetail, ApiResponse, RequestTimer};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Workflow(WorkflowError),
    /// Missing or wrong API key, or a bad webhook signature.
    Unauthorized(String),
    /// Malformed request (invalid JSON, bad ids in the body).
    Validation(String),
    NotFound(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Workflow(WorkflowError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND", "Workflow not found".to_string())
            }
            AppError::Workflow(WorkflowError::ExecutionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "EXECUTION_NOT_FOUND", "Execution not found".to_string())
            }
            AppError::Workflow(WorkflowError::Inactive(_)) => {
                (StatusCode::BAD_REQUEST, "WORKFLOW_INACTIVE", "Workflow is inactive".to_string())
            }
            AppError::Workflow(WorkflowError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Workflow(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            // Storage details stay in the logs, not in the response body
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiErrorDetail {
                code: code.to_string(),
                message,
            }),
            meta: RequestTimer::start().meta(),
        };

        (status, Json(body)).into_response()
    }
}
