//! Route definitions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// POST   /events             -> submit_event
/// GET    /jobs               -> list_jobs
/// GET    /jobs/{id}          -> get_job
/// POST   /jobs/{id}/cancel   -> cancel_job
/// GET    /pool               -> pool_status
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(handlers::submit_event))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/{id}", get(handlers::get_job))
        .route("/jobs/{id}/cancel", post(handlers::cancel_job))
        .route("/pool", get(handlers::pool_status))
}

/// Health check route (mounted at root level, NOT under `/api/v1`).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health_check))
}
