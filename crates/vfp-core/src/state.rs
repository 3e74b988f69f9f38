//! Job state machine.
//!
//! A job instance moves through
//! `Submitted -> Queued -> Running -> {Succeeded, Failed}`, with
//! cancellation permitted from `Queued` and `Running`. Terminal states have
//! no outgoing transitions; any attempt to leave one is rejected.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Created by the dispatcher, not yet accepted by the queue.
    Submitted,
    /// Waiting in the queue for worker capacity.
    Queued,
    /// Assigned to a capacity unit and executing.
    Running,
    /// Terminal: the executor reported success.
    Succeeded,
    /// Terminal: the executor reported failure. Not retried automatically.
    Failed,
    /// Terminal: cancelled before or during execution.
    Cancelled,
}

impl JobState {
    /// Returns the set of states reachable from `self`.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(self) -> &'static [JobState] {
        use JobState::*;
        match self {
            Submitted => &[Queued],
            Queued => &[Running, Cancelled],
            Running => &[Succeeded, Failed, Cancelled],
            Succeeded | Failed | Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: JobState) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning [`CoreError::InvalidTransition`]
    /// for forbidden ones.
    pub fn validate_transition(self, to: JobState) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from: self, to })
        }
    }

    /// Whether this state is terminal (no further transitions).
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::JobState::*;

    // -----------------------------------------------------------------------
    // Valid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn submitted_to_queued() {
        assert!(Submitted.can_transition(Queued));
    }

    #[test]
    fn queued_to_running() {
        assert!(Queued.can_transition(Running));
    }

    #[test]
    fn queued_to_cancelled() {
        assert!(Queued.can_transition(Cancelled));
    }

    #[test]
    fn running_to_succeeded() {
        assert!(Running.can_transition(Succeeded));
    }

    #[test]
    fn running_to_failed() {
        assert!(Running.can_transition(Failed));
    }

    #[test]
    fn running_to_cancelled() {
        assert!(Running.can_transition(Cancelled));
    }

    // -----------------------------------------------------------------------
    // Terminal states have no outgoing transitions
    // -----------------------------------------------------------------------

    #[test]
    fn succeeded_has_no_transitions() {
        assert!(Succeeded.valid_transitions().is_empty());
        assert!(Succeeded.is_terminal());
    }

    #[test]
    fn failed_has_no_transitions() {
        assert!(Failed.valid_transitions().is_empty());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn cancelled_has_no_transitions() {
        assert!(Cancelled.valid_transitions().is_empty());
        assert!(Cancelled.is_terminal());
    }

    // -----------------------------------------------------------------------
    // Invalid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn submitted_to_running_invalid() {
        assert!(!Submitted.can_transition(Running));
    }

    #[test]
    fn submitted_to_cancelled_invalid() {
        assert!(!Submitted.can_transition(Cancelled));
    }

    #[test]
    fn queued_to_succeeded_invalid() {
        assert!(!Queued.can_transition(Succeeded));
    }

    #[test]
    fn succeeded_to_running_invalid() {
        assert!(!Succeeded.can_transition(Running));
    }

    #[test]
    fn failed_to_queued_invalid() {
        assert!(!Failed.can_transition(Queued));
    }

    #[test]
    fn cancelled_to_running_invalid() {
        assert!(!Cancelled.can_transition(Running));
    }

    // -----------------------------------------------------------------------
    // validate_transition carries both states in the error
    // -----------------------------------------------------------------------

    #[test]
    fn validate_transition_ok() {
        assert!(Queued.validate_transition(Running).is_ok());
    }

    #[test]
    fn validate_transition_err() {
        let err = Succeeded.validate_transition(Running).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Succeeded"));
        assert!(msg.contains("Running"));
    }

    #[test]
    fn non_terminal_states_are_not_terminal() {
        assert!(!Submitted.is_terminal());
        assert!(!Queued.is_terminal());
        assert!(!Running.is_terminal());
    }
}
