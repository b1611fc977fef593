//! Poll-to-completion loop for one address.

use crate::client::{FetchError, ProcessingStatus, ScoreClient, ScoreRecord, ScoreResponse};
use crate::refresh::policy::needs_rescore;
use crate::refresh::schedule::{DelaySchedule, RefreshConfig};
use crate::refresh::state::SubmissionState;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("no address to refresh")]
    EmptyAddress,
    #[error("score fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("refresh superseded after {attempts} attempt(s)")]
    Superseded { attempts: u32 },
}

/// How a run ended when it did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshOutcome {
    /// The scorer finished and the record was accepted.
    Scored(ScoreRecord),
    /// The scorer reported a non-processing status without a record (e.g. `ERROR`).
    Settled(ProcessingStatus),
    /// Still processing when the attempt budget ran out.
    Exhausted {
        attempts: u32,
        last_status: ProcessingStatus,
    },
}

impl RefreshOutcome {
    /// Every completed run reports `SUCCESS`, exhaustion included; callers that
    /// care about a missing record inspect the outcome itself.
    pub fn submission_state(&self) -> SubmissionState {
        SubmissionState::Success
    }

    pub fn record(&self) -> Option<&ScoreRecord> {
        match self {
            Self::Scored(record) => Some(record),
            _ => None,
        }
    }

    pub fn last_status(&self) -> ProcessingStatus {
        match self {
            Self::Scored(_) => ProcessingStatus::Done,
            Self::Settled(status) => *status,
            Self::Exhausted { last_status, .. } => *last_status,
        }
    }
}

/// Hooks into a running refresh, checked at every suspension point.
pub trait RefreshObserver: Send {
    /// Called with the status of every successful fetch.
    fn on_status(&mut self, _status: ProcessingStatus) {}

    /// Returning true stops the run before its next fetch.
    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct NoopObserver;

impl RefreshObserver for NoopObserver {}

/// Drives a [`ScoreClient`] until the score is done, the scorer gives up, or the
/// attempt budget runs out.
pub struct PollingOrchestrator<C: ScoreClient + ?Sized> {
    client: Arc<C>,
    config: RefreshConfig,
}

impl<C: ScoreClient + ?Sized> PollingOrchestrator<C> {
    pub fn new(client: Arc<C>, config: RefreshConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(
        &self,
        address: &str,
        token: &str,
        observer: &mut dyn RefreshObserver,
    ) -> Result<RefreshOutcome, RefreshError> {
        if address.trim().is_empty() {
            return Err(RefreshError::EmptyAddress);
        }
        let max_attempts = self.config.max_attempts;
        let mut delays = DelaySchedule::new(&self.config);
        let mut attempts: u32 = 0;
        let mut rescore_issued = false;
        let mut force_rescore = false;
        let mut last_status = ProcessingStatus::Initial;

        while attempts < max_attempts {
            if observer.is_cancelled() {
                debug!(address, attempts, "refresh cancelled");
                return Err(RefreshError::Superseded { attempts });
            }
            attempts += 1;
            let response = match self
                .client
                .fetch_score(address, token, force_rescore)
                .await
            {
                Ok(response) => response,
                Err(source) if !rescore_issued && attempts < max_attempts => {
                    warn!(
                        address,
                        attempt = attempts,
                        error = %source,
                        "score read failed, forcing rescore"
                    );
                    rescore_issued = true;
                    force_rescore = true;
                    continue;
                }
                Err(source) => {
                    warn!(address, attempt = attempts, error = %source, "score refresh failed");
                    return Err(RefreshError::Fetch { attempts, source });
                }
            };
            force_rescore = false;
            last_status = response.status();
            observer.on_status(last_status);

            match response {
                ScoreResponse::Scored(record) => {
                    if needs_rescore(rescore_issued, record.raw_score, record.stamp_scores.as_ref())
                    {
                        if attempts >= max_attempts {
                            warn!(
                                address,
                                attempts,
                                raw_score = record.raw_score,
                                "stamp scores missing on last attempt, accepting record"
                            );
                            return Ok(RefreshOutcome::Scored(record));
                        }
                        info!(
                            address,
                            raw_score = record.raw_score,
                            "stamp scores missing, forcing rescore"
                        );
                        rescore_issued = true;
                        force_rescore = true;
                        continue;
                    }
                    info!(
                        address,
                        attempts,
                        raw_score = record.raw_score,
                        threshold = record.threshold,
                        "score done"
                    );
                    return Ok(RefreshOutcome::Scored(record));
                }
                ScoreResponse::Status(status) if status.is_processing() => {
                    if attempts >= max_attempts {
                        break;
                    }
                    let delay = delays.next().unwrap_or(self.config.max_delay);
                    debug!(
                        address,
                        attempt = attempts,
                        %status,
                        delay_ms = delay.as_millis() as u64,
                        "score processing"
                    );
                    tokio::time::sleep(delay).await;
                }
                ScoreResponse::Status(status) => {
                    info!(address, attempts, %status, "score settled without record");
                    return Ok(RefreshOutcome::Settled(status));
                }
            }
        }

        warn!(address, attempts, status = %last_status, "attempts exhausted before score was done");
        Ok(RefreshOutcome::Exhausted {
            attempts,
            last_status,
        })
    }
}
