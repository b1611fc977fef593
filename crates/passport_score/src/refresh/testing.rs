//! Scripted [`ScoreClient`] for unit tests.

use crate::client::{FetchError, ProcessingStatus, ScoreClient, ScoreResponse, Weights};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays scripted responses in order; answers PROCESSING once the script runs out.
pub(crate) struct ScriptedClient {
    script: Mutex<VecDeque<Result<ScoreResponse, FetchError>>>,
    weights: Mutex<VecDeque<Result<Weights, FetchError>>>,
    calls: Mutex<Vec<bool>>,
}

impl ScriptedClient {
    pub(crate) fn new(script: Vec<Result<ScoreResponse, FetchError>>) -> Arc<Self> {
        Self::with_weights(script, vec![])
    }

    pub(crate) fn with_weights(
        script: Vec<Result<ScoreResponse, FetchError>>,
        weights: Vec<Result<Weights, FetchError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            weights: Mutex::new(weights.into()),
            calls: Mutex::default(),
        })
    }

    /// `force_rescore` flag of every score fetch so far.
    pub(crate) fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoreClient for ScriptedClient {
    async fn fetch_score(
        &self,
        _address: &str,
        _token: &str,
        force_rescore: bool,
    ) -> Result<ScoreResponse, FetchError> {
        self.calls.lock().unwrap().push(force_rescore);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ScoreResponse::Status(ProcessingStatus::Processing)))
    }

    async fn fetch_weights(&self) -> Result<Weights, FetchError> {
        self.weights
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::OfflineMiss))
    }
}
