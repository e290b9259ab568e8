use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lswb_core::error::CoreError;
use lswb_dataset::DatasetError;
use lswb_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the pipeline crates and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `lswb_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A resource that is still being prepared.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

fn internal(error: &dyn std::fmt::Display) -> Classified {
    tracing::error!(error = %error, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

fn classify_dataset(err: &DatasetError) -> Classified {
    match err {
        DatasetError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        other => internal(other),
    }
}

/// Map a pipeline failure to an HTTP status, error code and message.
///
/// - An exhausted frame budget is a conflict with the current storage state.
/// - Storage and annotation service failures are upstream problems (502/503).
fn classify_pipeline(err: &PipelineError) -> Classified {
    match err {
        PipelineError::Core(core) => classify_core(core),
        PipelineError::Dataset(dataset) => classify_dataset(dataset),
        PipelineError::BudgetExhausted { .. } => (StatusCode::CONFLICT, "BUDGET_EXHAUSTED", err.to_string()),
        PipelineError::StorageUnavailable(_) => {
            tracing::warn!(error = %err, "Frame storage unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE", err.to_string())
        }
        PipelineError::Remote(_) | PipelineError::LabelStudio(_) => {
            tracing::error!(error = %err, "Upstream service error");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        other => internal(other),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Pipeline(err) => classify_pipeline(err),
            AppError::Dataset(err) => classify_dataset(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
