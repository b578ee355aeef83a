//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE for "relation does not exist".
const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for "column does not exist".
const UNDEFINED_COLUMN: &str = "42703";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("database: {0}")]
    Connect(String),
}

/// Kind tag carried by every [`AccessError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    ExecutionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ExecutionError => "execution_error",
        }
    }
}

/// Normalized data-access error. Driver errors are flattened into a message so that
/// `sqlx` types never leave the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("execution: {0}")]
    Execution(String),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::Validation(_) => ErrorKind::ValidationError,
            AccessError::Execution(_) => ErrorKind::ExecutionError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AccessError::NotFound(m) | AccessError::Validation(m) | AccessError::Execution(m) => m,
        }
    }

    pub(crate) fn table_not_found(schema: &str, table: &str) -> Self {
        AccessError::NotFound(format!("table {}.{}", schema, table))
    }
}

impl From<sqlx::Error> for AccessError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AccessError::NotFound("row".into()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(UNDEFINED_TABLE) => AccessError::NotFound(db.message().to_string()),
                Some(UNDEFINED_COLUMN) => AccessError::Validation(db.message().to_string()),
                _ => AccessError::Execution(db.message().to_string()),
            },
            _ => AccessError::Execution(e.to_string()),
        }
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Access(e) => match e.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.kind().as_str()),
                ErrorKind::ValidationError => (StatusCode::UNPROCESSABLE_ENTITY, e.kind().as_str()),
                ErrorKind::ExecutionError => (StatusCode::INTERNAL_SERVER_ERROR, e.kind().as_str()),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::Access(e) => e.message().to_string(),
            AppError::BadRequest(m) => m.clone(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
