use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pictor_core::error::CoreError;
use pictor_pipeline::gate::GateError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`GateError`] for admission
/// rejections, plus HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `pictor_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An admission rejection from the generation gate.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A conflict with the resource's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Content-safety rejections carry the id of the terminally-failed
        // job so clients can still poll it.
        if let AppError::Gate(GateError::Unsafe { job_id, reason }) = &self {
            let body = json!({
                "error": format!("Prompt rejected by content-safety check: {reason}"),
                "code": "UNSAFE_CONTENT",
                "job_id": job_id,
            });
            return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
        }

        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Gate(gate) => match gate {
                GateError::Invalid(core) => classify_core_error(core),
                // Handled above.
                GateError::Unsafe { .. } => unreachable!(),
                GateError::Busy { .. } => (StatusCode::TOO_MANY_REQUESTS, "BUSY", gate.to_string()),
                GateError::Internal(msg) => {
                    tracing::error!(error = %msg, "Admission gate internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Unsafe(msg) => (StatusCode::FORBIDDEN, "UNSAFE_CONTENT", msg.clone()),
        CoreError::Busy { .. } => (StatusCode::TOO_MANY_REQUESTS, "BUSY", core.to_string()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
