//! Shared error taxonomy for the dispatch core.

use crate::state::JobState;

/// Domain-level errors.
///
/// Each variant maps to one failure class of the dispatch core:
///
/// - [`InvalidEvent`](CoreError::InvalidEvent): malformed arrival event,
///   rejected before any job instance is created.
/// - [`TemplateRender`](CoreError::TemplateRender): an argument placeholder
///   could not be resolved. This is a configuration defect and fails the
///   dispatch attempt outright.
/// - [`NotFound`](CoreError::NotFound): an id (job, template, capacity
///   unit) does not exist.
/// - [`InvalidTransition`](CoreError::InvalidTransition): a caller asked
///   for a state change the job state machine forbids.
/// - [`CapacityUnavailable`](CoreError::CapacityUnavailable): transient, no
///   idle worker capacity right now, the caller re-polls.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid arrival event: {0}")]
    InvalidEvent(String),

    #[error("Template render failed: {0}")]
    TemplateRender(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("No worker capacity available")]
    CapacityUnavailable,
}
