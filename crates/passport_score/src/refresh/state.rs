use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one refresh run as seen by the dashboard.
///
/// Runs move `INITIAL → PENDING → (ERROR | SUCCESS)`; a new run re-enters
/// `PENDING` from any state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    #[default]
    Initial,
    Pending,
    Error,
    Success,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("cannot move submission from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: SubmissionState,
    pub to: SubmissionState,
}

impl SubmissionState {
    pub fn begin(self) -> Self {
        Self::Pending
    }

    pub fn succeed(self) -> Result<Self, TransitionError> {
        self.settle(Self::Success)
    }

    pub fn fail(self) -> Result<Self, TransitionError> {
        self.settle(Self::Error)
    }

    fn settle(self, to: Self) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(to),
            from => Err(TransitionError { from, to }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Success)
    }
}
