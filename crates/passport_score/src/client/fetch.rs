//! Ceramic-cache scorer client. Issues one request per call; retrying is the
//! refresh loop's job.

use crate::client::cache::{Cache, CacheError};
use crate::client::normalize::{decode_score_response, decode_weights, NormalizeError};
use crate::client::record::{ScoreResponse, Weights};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_CERAMIC_CACHE_URL: &str = "https://api.scorer.gitcoin.co/ceramic-cache";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ENDPOINT_ENV: &str = "PASSPORT_CERAMIC_CACHE_ENDPOINT";

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Serve weights from the cache only and refuse score requests.
    pub offline: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CERAMIC_CACHE_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            offline: false,
        }
    }
}

impl FetchConfig {
    /// Defaults, with the base url taken from `PASSPORT_CERAMIC_CACHE_ENDPOINT` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENDPOINT_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        config
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `{base}/score/{address}` with the address percent-encoded.
    pub fn score_url(&self, address: &str) -> Result<Url, FetchError> {
        let raw = format!("{}/score/{}", self.base(), urlencoding::encode(address));
        Ok(Url::parse(&raw)?)
    }

    pub fn weights_url(&self) -> Result<Url, FetchError> {
        Ok(Url::parse(&format!("{}/weights", self.base()))?)
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("malformed response: {0}")]
    Malformed(#[from] NormalizeError),
    #[error("url: {0}")]
    Url(#[from] url::ParseError),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("offline mode: no cached data for request")]
    OfflineMiss,
}

/// Read/recompute access to a holder's score and the provider weights.
#[async_trait]
pub trait ScoreClient: Send + Sync {
    /// Read the current score (`force_rescore = false`) or ask the scorer to
    /// recompute it first (`force_rescore = true`).
    async fn fetch_score(
        &self,
        address: &str,
        token: &str,
        force_rescore: bool,
    ) -> Result<ScoreResponse, FetchError>;

    async fn fetch_weights(&self) -> Result<Weights, FetchError>;
}

/// reqwest-backed [`ScoreClient`] with an optional weights cache.
pub struct Fetcher {
    config: FetchConfig,
    client: Option<reqwest::Client>,
    cache: Option<Cache>,
    request_count: AtomicU64,
}

impl Fetcher {
    pub fn new(config: FetchConfig, cache: Option<Cache>) -> Result<Self, FetchError> {
        let client = if config.offline {
            None
        } else {
            Some(
                reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(config.timeout)
                    .build()?,
            )
        };
        Ok(Self {
            config,
            client,
            cache,
            request_count: AtomicU64::new(0),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, FetchError> {
        let res = request.send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(FetchError::Api(status.as_u16(), body));
        }
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Ok(body)
    }

    fn cached_weights(&self, key: &str) -> Result<Weights, FetchError> {
        let cache = self.cache.as_ref().ok_or(FetchError::OfflineMiss)?;
        let cached = cache.load(key)?.ok_or(FetchError::OfflineMiss)?;
        debug!(fetched_utc = cached.fetched_utc, "weights cache hit");
        Ok(decode_weights(&cached.body)?)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScoreClient for Fetcher {
    async fn fetch_score(
        &self,
        address: &str,
        token: &str,
        force_rescore: bool,
    ) -> Result<ScoreResponse, FetchError> {
        let client = self.client.as_ref().ok_or(FetchError::OfflineMiss)?;
        let url = self.config.score_url(address)?;
        let request = if force_rescore {
            client.post(url)
        } else {
            client.get(url)
        };
        let body = self.send(request.bearer_auth(token)).await?;
        let response = decode_score_response(&body)?;
        debug!(address, force_rescore, status = %response.status(), "score fetched");
        Ok(response)
    }

    async fn fetch_weights(&self) -> Result<Weights, FetchError> {
        let url = self.config.weights_url()?;
        let key = Cache::key_for(url.as_str());
        let Some(client) = self.client.as_ref() else {
            return self.cached_weights(&key);
        };
        let body = self.send(client.get(url)).await?;
        let weights = decode_weights(&body)?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&key, &body) {
                warn!(error = %e, "failed to cache weights");
            }
        }
        info!(providers = weights.len(), "weights fetched");
        Ok(weights)
    }
}
