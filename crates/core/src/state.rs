//! Job lifecycle state machine.
//!
//! A job moves `Stopped → Starting → Running → {Done | Failed}`. The two
//! terminal states are absorbing: once reached, no further transition is
//! legal. Transition legality is data, not runner policy, so it lives here
//! where it can be tested without any async machinery.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a single job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Initial state; the job has been created but not started.
    Stopped,
    /// `start()` has been called; the execution task is being submitted.
    Starting,
    /// The execution task is in flight.
    Running,
    /// The execution task completed successfully. Terminal.
    Done,
    /// The execution task failed or was cancelled. Terminal.
    Failed,
}

impl JobState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Failed)
        )
    }

    /// Validate a transition, returning the new state or an error.
    pub fn transition_to(self, next: JobState) -> Result<JobState, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition { from: self, to: next })
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
