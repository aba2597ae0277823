//! Submission lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::{TipError, TipResult};
use crate::models::ExecutionStatus;

/// Lifecycle of one tip submission.
///
/// ```text
/// Idle -> Built -> Submitting -> { Succeeded | PartialFailure | Failed }
/// ```
///
/// Terminal states have no outgoing transitions; a retry starts over with
/// a new request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Built,
    Submitting,
    Succeeded,
    PartialFailure,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Built => "built",
            SubmissionState::Submitting => "submitting",
            SubmissionState::Succeeded => "succeeded",
            SubmissionState::PartialFailure => "partial_failure",
            SubmissionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Succeeded | SubmissionState::PartialFailure | SubmissionState::Failed
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(self, next: SubmissionState) -> TipResult<SubmissionState> {
        use SubmissionState::*;

        let allowed = matches!(
            (self, next),
            (Idle, Built)
                | (Built, Submitting)
                | (Submitting, Succeeded)
                | (Submitting, PartialFailure)
                | (Submitting, Failed)
        );
        if !allowed {
            return Err(TipError::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        Ok(next)
    }
}

impl From<ExecutionStatus> for SubmissionState {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Succeeded => SubmissionState::Succeeded,
            ExecutionStatus::PartialFailure => SubmissionState::PartialFailure,
            ExecutionStatus::Failed => SubmissionState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SubmissionState::default()
            .transition(SubmissionState::Built)
            .and_then(|s| s.transition(SubmissionState::Submitting))
            .and_then(|s| s.transition(ExecutionStatus::PartialFailure.into()))
            .unwrap();
        assert_eq!(state, SubmissionState::PartialFailure);
        assert!(state.is_terminal());
    }

    // Critical: terminal states cannot be resubmitted
    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [
            SubmissionState::Succeeded,
            SubmissionState::PartialFailure,
            SubmissionState::Failed,
        ] {
            assert!(terminal.transition(SubmissionState::Submitting).is_err());
            assert!(terminal.transition(SubmissionState::Built).is_err());
        }
    }

    #[test]
    fn test_cannot_skip_build() {
        let err = SubmissionState::Idle
            .transition(SubmissionState::Submitting)
            .unwrap_err();
        assert!(err.to_string().contains("idle -> submitting"));
    }
}
