use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::editor::EditorError;
use crate::postgres::PostgresPoolError;
use crate::template::{TemplateError, TemplateErrorInfo, TemplateErrorResponse};
use crate::upload::UploadError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] PostgresPoolError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::Template(e) => AppError::Template(e),
            EditorError::NoDocumentLoaded => AppError::Validation(err.to_string()),
        }
    }
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    /// HTTP status and error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Template(e) => {
                let status = match e {
                    TemplateError::NotFound(_) => StatusCode::NOT_FOUND,
                    TemplateError::Conflict { .. } => StatusCode::CONFLICT,
                    TemplateError::InvalidPosition(_)
                    | TemplateError::CycleRejected { .. }
                    | TemplateError::InvalidTemplate(_) => StatusCode::BAD_REQUEST,
                    TemplateError::UnknownComponentType(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    TemplateError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    TemplateError::Transport(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.code())
            }
            AppError::Upload(e) => match e {
                UploadError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "UPLOAD_TOO_LARGE"),
                UploadError::UnsupportedType(_) | UploadError::Missing => {
                    (StatusCode::BAD_REQUEST, "INVALID_UPLOAD")
                }
                UploadError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_FAILED"),
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn into_body(self) -> (StatusCode, TemplateErrorResponse) {
        let (status, code) = self.status_and_code();
        let log_message = self.to_string();

        if status.is_server_error() {
            // Always log the detailed error server-side
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "Request rejected"
            );
        }

        let body = match self {
            AppError::Template(e) if !status.is_server_error() => TemplateErrorResponse::from(&e),
            _ => {
                let message = if status.is_server_error() && is_production() {
                    "Internal server error".to_string()
                } else {
                    log_message
                };
                TemplateErrorResponse {
                    error: TemplateErrorInfo {
                        code: code.to_string(),
                        message,
                        details: None,
                    },
                }
            }
        };

        (status, body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_body();
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
