use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vfp_core::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and implements [`IntoResponse`] to
/// produce consistent JSON error responses. Every failure path reaches the
/// caller as an observable status; nothing is swallowed.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the dispatch core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::InvalidEvent(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_EVENT", msg.clone())
                }
                // A render failure is a configuration defect, not a caller
                // mistake; surface it loudly.
                CoreError::TemplateRender(msg) => {
                    tracing::error!(error = %msg, "Template render defect");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "TEMPLATE_RENDER_ERROR",
                        msg.clone(),
                    )
                }
                CoreError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", core.to_string())
                }
                CoreError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", core.to_string())
                }
                // Transient; the event source should redeliver/re-poll.
                CoreError::CapacityUnavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CAPACITY_UNAVAILABLE",
                    core.to_string(),
                ),
            },
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
