use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use cropwatch_core::error::DomainError;
use cropwatch_core::ingest::IngestError;
use cropwatch_core::lifecycle::LifecycleError;
use cropwatch_core::ports::StorageError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain and storage taxonomies and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An expected business failure from `cropwatch_core`.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An infrastructure failure from the persistence layer.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A telemetry ingestion failure.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A database error from sqlx (read-model queries go straight to sqlx).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Domain(e) => AppError::Domain(e),
            LifecycleError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, errors) = match &self {
            AppError::Domain(domain) => domain_response(domain, StatusCode::BAD_REQUEST),

            // A poison event is permanently unprocessable, which is a
            // different contract from a malformed request: 422 tells the
            // transport not to redeliver.
            AppError::Ingest(IngestError::Poison(domain)) => {
                domain_response(domain, StatusCode::UNPROCESSABLE_ENTITY)
            }
            AppError::Ingest(IngestError::Storage(storage)) => storage_response(storage),

            AppError::Storage(storage) => storage_response(storage),

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(errors) = errors {
            body["errors"] = errors;
        }

        (status, axum::Json(body)).into_response()
    }
}

type ErrorParts = (StatusCode, &'static str, String, Option<serde_json::Value>);

/// Map a domain error, parameterized on the status used for validation
/// failures (400 for commands, 422 for poison telemetry).
fn domain_response(domain: &DomainError, invalid_status: StatusCode) -> ErrorParts {
    match domain {
        DomainError::Invalid(errors) => (
            invalid_status,
            "VALIDATION_ERROR",
            "Validation failed".to_string(),
            Some(json!(errors)),
        ),
        DomainError::Conflict { code, message } => {
            (StatusCode::CONFLICT, code, message.clone(), None)
        }
        DomainError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
            None,
        ),
    }
}

fn storage_response(storage: &StorageError) -> ErrorParts {
    match storage {
        StorageError::Duplicate { entity } => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate {entity}"),
            None,
        ),
        StorageError::Conflict { entity } => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Concurrent modification of {entity}"),
            None,
        ),
        StorageError::Unavailable(err) => {
            tracing::error!(error = %err, "Storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Storage temporarily unavailable".to_string(),
                None,
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (PostgreSQL 23505) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
            None,
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Duplicate value violates unique constraint".to_string(),
            None,
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
    }
}
