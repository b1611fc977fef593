//! Dashboard-facing score state: one slot per address, plus shared weights.
//!
//! Each refresh takes a generation number for its address. A run that has been
//! superseded by a newer one for the same address stops at its next fetch, and
//! anything it finishes with is discarded instead of published.

use crate::aggregate::{aggregate, PlatformScore};
use crate::catalog::PlatformCatalog;
use crate::client::{FetchError, ProcessingStatus, ScoreClient, ScoreRecord, Weights};
use crate::refresh::{
    PollingOrchestrator, RefreshConfig, RefreshError, RefreshObserver, RefreshOutcome,
    SubmissionState,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
struct AddressState {
    generation: u64,
    submission_state: SubmissionState,
    score_state: ProcessingStatus,
    record: Option<ScoreRecord>,
    scored_platforms: Vec<PlatformScore>,
    refreshed_utc_rfc3339: Option<String>,
}

/// Immutable snapshot of everything the dashboard renders for one address.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
    pub address: String,
    pub score: f64,
    pub raw_score: f64,
    pub threshold: f64,
    pub score_description: String,
    pub passport_submission_state: SubmissionState,
    pub score_state: ProcessingStatus,
    pub stamp_weights: Weights,
    pub scored_platforms: Vec<PlatformScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_utc_rfc3339: Option<String>,
    /// Set while the most recent weights fetch has failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_error: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct WeightsState {
    weights: Option<Weights>,
    last_error: Option<String>,
}

type AddressMap = Mutex<HashMap<String, AddressState>>;

fn lock(map: &AddressMap) -> MutexGuard<'_, HashMap<String, AddressState>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ties a run to its generation: forwards statuses while current, cancels once stale.
struct GenerationGuard<'a> {
    addresses: &'a AddressMap,
    address: &'a str,
    generation: u64,
}

impl GenerationGuard<'_> {
    fn is_current(&self, state: &AddressState) -> bool {
        state.generation == self.generation
    }
}

impl RefreshObserver for GenerationGuard<'_> {
    fn on_status(&mut self, status: ProcessingStatus) {
        let mut map = lock(self.addresses);
        if let Some(state) = map.get_mut(self.address).filter(|s| self.is_current(s)) {
            state.score_state = status;
        }
    }

    fn is_cancelled(&self) -> bool {
        !lock(self.addresses)
            .get(self.address)
            .is_some_and(|s| self.is_current(s))
    }
}

pub struct ScoreContext<C: ScoreClient + ?Sized> {
    client: Arc<C>,
    orchestrator: PollingOrchestrator<C>,
    catalog: PlatformCatalog,
    weights: RwLock<WeightsState>,
    addresses: AddressMap,
}

impl<C: ScoreClient + ?Sized> ScoreContext<C> {
    pub fn new(client: Arc<C>, catalog: PlatformCatalog, config: RefreshConfig) -> Self {
        Self {
            orchestrator: PollingOrchestrator::new(client.clone(), config),
            client,
            catalog,
            weights: RwLock::new(WeightsState::default()),
            addresses: Mutex::new(HashMap::new()),
        }
    }

    fn read_weights(&self) -> RwLockReadGuard<'_, WeightsState> {
        self.weights.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn blank_state(&self) -> AddressState {
        AddressState {
            scored_platforms: aggregate(self.catalog.entries(), None, None),
            ..Default::default()
        }
    }

    /// Poll the scorer for `address` until the run settles and publish the result.
    ///
    /// An empty address is a no-op. Returns the address's submission state after
    /// the run; a superseded run leaves the newer run's state untouched.
    pub async fn refresh_score(&self, address: &str, token: &str) -> SubmissionState {
        if address.trim().is_empty() {
            debug!("refresh skipped: no address");
            return SubmissionState::Initial;
        }

        let generation = {
            let mut map = lock(&self.addresses);
            let state = map
                .entry(address.to_string())
                .or_insert_with(|| self.blank_state());
            state.generation += 1;
            state.submission_state = state.submission_state.begin();
            state.generation
        };

        let mut guard = GenerationGuard {
            addresses: &self.addresses,
            address,
            generation,
        };
        let result = self.orchestrator.run(address, token, &mut guard).await;

        let weights = self.read_weights();
        let mut map = lock(&self.addresses);
        let Some(state) = map.get_mut(address) else {
            return SubmissionState::Initial;
        };
        if state.generation != generation {
            debug!(
                address,
                generation,
                current = state.generation,
                "discarding stale refresh"
            );
            return state.submission_state;
        }

        let settled = match result {
            Ok(outcome) => {
                if let RefreshOutcome::Exhausted { attempts, .. } = &outcome {
                    info!(address, attempts, "refresh ended without a finished score");
                }
                state.score_state = outcome.last_status();
                let next = state.submission_state.succeed();
                if let RefreshOutcome::Scored(record) = outcome {
                    state.scored_platforms = aggregate(
                        self.catalog.entries(),
                        weights.weights.as_ref(),
                        record.stamp_scores.as_ref(),
                    );
                    state.record = Some(record);
                    state.refreshed_utc_rfc3339 =
                        time::OffsetDateTime::now_utc().format(&Rfc3339).ok();
                }
                next
            }
            Err(RefreshError::Superseded { .. }) => return state.submission_state,
            Err(e) => {
                warn!(address, error = %e, "score refresh failed");
                state.submission_state.fail()
            }
        };
        state.submission_state = match settled {
            Ok(next) => next,
            Err(e) => {
                warn!(address, error = %e, "unexpected submission transition");
                SubmissionState::Error
            }
        };
        state.submission_state
    }

    /// Replace the provider weights and re-project every address's platforms.
    ///
    /// On failure the previous weights stay current and every view reports the
    /// error. Addresses without a refresh in flight move to `ERROR`.
    pub async fn fetch_stamp_weights(&self) -> Result<(), FetchError> {
        let result = self.client.fetch_weights().await;
        let mut current = self.weights.write().unwrap_or_else(PoisonError::into_inner);
        let weights = match result {
            Ok(weights) => weights,
            Err(e) => {
                warn!(error = %e, "stamp weights fetch failed");
                current.last_error = Some(e.to_string());
                let mut map = lock(&self.addresses);
                for state in map
                    .values_mut()
                    .filter(|s| s.submission_state != SubmissionState::Pending)
                {
                    state.submission_state = SubmissionState::Error;
                }
                return Err(e);
            }
        };
        current.weights = Some(weights);
        current.last_error = None;
        let mut map = lock(&self.addresses);
        for state in map.values_mut() {
            state.scored_platforms = aggregate(
                self.catalog.entries(),
                current.weights.as_ref(),
                state.record.as_ref().and_then(|r| r.stamp_scores.as_ref()),
            );
        }
        info!(addresses = map.len(), "stamp weights updated");
        Ok(())
    }

    pub fn submission_state(&self, address: &str) -> SubmissionState {
        lock(&self.addresses)
            .get(address)
            .map(|s| s.submission_state)
            .unwrap_or_default()
    }

    /// Snapshot for `address`. Unknown addresses report initial state with
    /// zero-point platforms.
    pub fn view(&self, address: &str) -> ScoreView {
        let WeightsState {
            weights,
            last_error,
        } = self.read_weights().clone();
        let state = lock(&self.addresses)
            .get(address)
            .cloned()
            .unwrap_or_else(|| self.blank_state());
        let score_description = state
            .record
            .as_ref()
            .map(|r| r.description().to_string())
            .unwrap_or_default();
        let record = state.record.unwrap_or_default();
        ScoreView {
            address: address.to_string(),
            score: record.score,
            raw_score: record.raw_score,
            threshold: record.threshold,
            score_description,
            passport_submission_state: state.submission_state,
            score_state: state.score_state,
            stamp_weights: weights.unwrap_or_default(),
            scored_platforms: state.scored_platforms,
            refreshed_utc_rfc3339: state.refreshed_utc_rfc3339,
            weights_error: last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PlatformCatalogEntry, PlatformGroup, ProviderSpec};
    use crate::client::{ScoreResponse, StampScores};
    use crate::refresh::testing::ScriptedClient;

    fn catalog() -> PlatformCatalog {
        let entry = |id: &str| PlatformCatalogEntry {
            platform: id.to_string(),
            name: id.to_string(),
            groups: vec![PlatformGroup {
                platform_group: "Account".to_string(),
                providers: vec![ProviderSpec {
                    title: id.to_string(),
                    name: id.to_string(),
                }],
            }],
            ..Default::default()
        };
        PlatformCatalog::new(vec![entry("Github"), entry("Brightid")])
    }

    fn stamps(entries: &[(&str, f64)]) -> StampScores {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn done(raw: f64, stamp_scores: Option<StampScores>) -> Result<ScoreResponse, FetchError> {
        Ok(ScoreResponse::Scored(ScoreRecord {
            raw_score: raw,
            threshold: 10.0,
            score: raw,
            stamp_scores,
        }))
    }

    #[tokio::test]
    async fn empty_address_is_a_noop() {
        let client = ScriptedClient::new(vec![]);
        let ctx = ScoreContext::new(client.clone(), catalog(), RefreshConfig::default());
        assert_eq!(ctx.refresh_score("", "t").await, SubmissionState::Initial);
        assert!(client.calls().is_empty());
        assert_eq!(ctx.submission_state(""), SubmissionState::Initial);
    }

    #[tokio::test]
    async fn unknown_address_view_is_blank() {
        let client = ScriptedClient::new(vec![]);
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        let view = ctx.view("0xnobody");
        assert_eq!(view.passport_submission_state, SubmissionState::Initial);
        assert_eq!(view.score_state, ProcessingStatus::Initial);
        assert_eq!(view.score_description, "");
        assert_eq!(view.scored_platforms.len(), 2);
        assert!(view.stamp_weights.is_empty());
    }

    #[tokio::test]
    async fn weights_then_refresh_projects_platforms() {
        let weights = stamps(&[("Github", 2.0), ("Brightid", 3.0)]);
        let client = ScriptedClient::with_weights(
            vec![done(15.0, Some(stamps(&[("Github", 2.0)])))],
            vec![Ok(weights)],
        );
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        ctx.fetch_stamp_weights().await.unwrap();
        assert_eq!(ctx.refresh_score("0xabc", "t").await, SubmissionState::Success);

        let view = ctx.view("0xabc");
        assert_eq!(view.score_description, "Passing Score");
        assert_eq!(view.score_state, ProcessingStatus::Done);
        assert_eq!(view.raw_score, 15.0);
        assert!(view.refreshed_utc_rfc3339.is_some());
        assert_eq!(view.scored_platforms[0].possible_points, 2.0);
        assert_eq!(view.scored_platforms[0].earned_points, 2.0);
        assert_eq!(view.scored_platforms[1].possible_points, 3.0);
        assert_eq!(view.scored_platforms[1].earned_points, 0.0);
    }

    #[tokio::test]
    async fn refresh_then_weights_reprojects() {
        let client = ScriptedClient::with_weights(
            vec![done(15.0, Some(stamps(&[("Brightid", 3.0)])))],
            vec![Ok(stamps(&[("Brightid", 3.0)]))],
        );
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        ctx.refresh_score("0xabc", "t").await;
        assert_eq!(ctx.view("0xabc").scored_platforms[1].earned_points, 0.0);
        ctx.fetch_stamp_weights().await.unwrap();
        let view = ctx.view("0xabc");
        assert_eq!(view.scored_platforms[1].earned_points, 3.0);
        assert_eq!(view.scored_platforms[1].possible_points, 3.0);
    }

    #[tokio::test]
    async fn failed_weights_keep_previous() {
        let client = ScriptedClient::with_weights(
            vec![],
            vec![
                Ok(stamps(&[("Github", 1.0)])),
                Err(FetchError::Api(503, "down".to_string())),
            ],
        );
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        ctx.fetch_stamp_weights().await.unwrap();
        assert!(ctx.fetch_stamp_weights().await.is_err());
        let view = ctx.view("0xabc");
        assert_eq!(view.stamp_weights["Github"], 1.0);
        assert!(view.weights_error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn failed_weights_mark_tracked_addresses_errored() {
        let client = ScriptedClient::with_weights(
            vec![done(15.0, Some(stamps(&[("Github", 2.0)])))],
            vec![
                Err(FetchError::Api(503, "down".to_string())),
                Ok(stamps(&[("Github", 2.0)])),
            ],
        );
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        assert_eq!(ctx.refresh_score("0xabc", "t").await, SubmissionState::Success);
        assert!(ctx.fetch_stamp_weights().await.is_err());

        let view = ctx.view("0xabc");
        assert_eq!(view.passport_submission_state, SubmissionState::Error);
        assert!(view.weights_error.is_some());
        assert_eq!(view.raw_score, 15.0);

        ctx.fetch_stamp_weights().await.unwrap();
        let view = ctx.view("0xabc");
        assert_eq!(view.weights_error, None);
        assert_eq!(view.scored_platforms[0].earned_points, 2.0);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_record() {
        let client = ScriptedClient::new(vec![
            done(15.0, Some(stamps(&[("Github", 2.0)]))),
            Err(FetchError::Api(500, "a".to_string())),
            Err(FetchError::Api(500, "b".to_string())),
        ]);
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        assert_eq!(ctx.refresh_score("0xabc", "t").await, SubmissionState::Success);
        assert_eq!(ctx.refresh_score("0xabc", "t").await, SubmissionState::Error);
        let view = ctx.view("0xabc");
        assert_eq!(view.passport_submission_state, SubmissionState::Error);
        assert_eq!(view.raw_score, 15.0);
        assert_eq!(view.score_description, "Passing Score");
    }

    #[tokio::test]
    async fn addresses_are_independent() {
        let client = ScriptedClient::new(vec![
            done(15.0, Some(stamps(&[("Github", 2.0)]))),
            done(5.0, Some(stamps(&[("Brightid", 1.0)]))),
        ]);
        let ctx = ScoreContext::new(client, catalog(), RefreshConfig::default());
        ctx.refresh_score("0xaaa", "t").await;
        ctx.refresh_score("0xbbb", "t").await;
        assert_eq!(ctx.view("0xaaa").score_description, "Passing Score");
        assert_eq!(ctx.view("0xbbb").score_description, "Low Score");
    }

    #[tokio::test(start_paused = true)]
    async fn newer_refresh_supersedes_older_run() {
        let client = ScriptedClient::new(vec![
            Ok(ScoreResponse::Status(ProcessingStatus::Processing)),
            done(5.0, Some(stamps(&[("Github", 1.0)]))),
        ]);
        let ctx = ScoreContext::new(client.clone(), catalog(), RefreshConfig::default());
        let (first, second) = tokio::join!(ctx.refresh_score("0xabc", "t"), async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            ctx.refresh_score("0xabc", "t").await
        });
        assert_eq!(second, SubmissionState::Success);
        assert_eq!(first, SubmissionState::Success);
        // The stale run stopped instead of polling again.
        assert_eq!(client.calls(), vec![false, false]);
        assert_eq!(ctx.view("0xabc").raw_score, 5.0);
    }
}
