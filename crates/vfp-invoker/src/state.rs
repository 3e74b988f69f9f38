use std::sync::Arc;

use vfp_engine::{JobDispatcher, JobQueue, ResourcePoolManager, Scheduler};

use crate::config::InvokerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every collaborator is behind an `Arc`. Constructed
/// explicitly in `main`; no component reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<InvokerConfig>,
    /// Entry point turning arrival events into queued jobs.
    pub dispatcher: Arc<JobDispatcher>,
    /// Source of truth for job instances and their states.
    pub queue: Arc<JobQueue>,
    /// Elastic worker capacity pool (read for observability endpoints).
    pub pool: Arc<ResourcePoolManager>,
    /// Scheduler handle, used for cancellation requests.
    pub scheduler: Arc<Scheduler>,
}
