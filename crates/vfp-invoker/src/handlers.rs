//! Handlers for the arrival-event and job resources.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vfp_core::{ArrivalEvent, CoreError, JobState};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Arrival events
// ---------------------------------------------------------------------------

/// Inbound notification payload from the storage notification source.
///
/// Field names are camelCase on the wire. Both fields default to empty so a
/// malformed payload surfaces as a domain `INVALID_EVENT` error rather than
/// a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalNotification {
    #[serde(default)]
    pub source_location: String,
    #[serde(default)]
    pub object_key: String,
}

/// Response payload for a dispatched event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatched {
    pub job_id: Uuid,
}

/// POST /api/v1/events
///
/// Dispatch one arrival notification. Returns 202 with the created job id.
/// Delivery is at-least-once upstream: redelivered notifications create
/// duplicate jobs by design, so the caller must not treat a 202 as "first
/// time seen".
pub async fn submit_event(
    State(state): State<AppState>,
    Json(input): Json<ArrivalNotification>,
) -> AppResult<impl IntoResponse> {
    let event = ArrivalEvent::new(input.source_location, input.object_key);
    let job_id = state.dispatcher.dispatch(event)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: Dispatched { job_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Query parameters for job listing.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// Optional state filter, e.g. `?state=RUNNING`.
    pub state: Option<JobState>,
}

/// GET /api/v1/jobs
///
/// List all jobs known to this process, oldest first, optionally filtered
/// by state.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let mut jobs = state.queue.jobs();
    if let Some(filter) = query.state {
        jobs.retain(|job| job.state == filter);
    }
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let job = state.queue.job(id).ok_or(AppError::Core(CoreError::NotFound {
        entity: "JobInstance",
        id: id.to_string(),
    }))?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// Request cancellation. Queued jobs cancel immediately; running jobs are
/// signalled and transition once the executor confirms termination, so the
/// job returned here may still be `RUNNING`.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.scheduler.cancel(id)?;

    tracing::info!(job_id = %id, "Cancellation requested");

    let job = state.queue.job(id).ok_or(AppError::Core(CoreError::NotFound {
        entity: "JobInstance",
        id: id.to_string(),
    }))?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Worker pool snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub total_vcpus: u32,
    pub assigned_vcpus: u32,
    pub unit_count: usize,
    pub queued_depth: usize,
}

/// GET /api/v1/pool
pub async fn pool_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: PoolStatus {
            total_vcpus: state.pool.total_vcpus(),
            assigned_vcpus: state.pool.assigned_vcpus(),
            unit_count: state.pool.unit_count(),
            queued_depth: state.queue.queued_depth(),
        },
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Logical job queue this process serves.
    pub job_queue: String,
}

/// GET /health: returns service liveness.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        job_queue: state.config.job_queue_name.clone(),
    })
}
