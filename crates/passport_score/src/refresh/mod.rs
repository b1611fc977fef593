//! Score refresh: rescore decisions, poll scheduling, and the submission state machine.

mod orchestrator;
mod policy;
mod schedule;
mod state;

pub use orchestrator::{
    NoopObserver, PollingOrchestrator, RefreshError, RefreshObserver, RefreshOutcome,
};
pub use policy::needs_rescore;
pub use schedule::{DelaySchedule, RefreshConfig};
pub use state::{SubmissionState, TransitionError};

#[cfg(test)]
pub(crate) mod testing;
