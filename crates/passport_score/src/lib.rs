//! passport_score — score refresh for the Passport dashboard.
//!
//! Fetches the remotely computed trust score for a wallet address, polls while
//! the scorer is still processing, forces a rescore when the per-stamp
//! breakdown is missing, and projects stamp weights and scores onto the
//! platform catalog.

pub mod aggregate;
pub mod catalog;
pub mod client;
pub mod context;
pub mod refresh;

pub use aggregate::{aggregate, PlatformScore};
pub use catalog::{CatalogError, PlatformCatalog, PlatformCatalogEntry};
pub use client::{
    parse_float_or_zero, Cache, FetchConfig, FetchError, Fetcher, ProcessingStatus, ScoreClient,
    ScoreRecord, ScoreResponse, StampScores, Weights,
};
pub use context::{ScoreContext, ScoreView};
pub use refresh::{
    needs_rescore, DelaySchedule, NoopObserver, PollingOrchestrator, RefreshConfig,
    RefreshError, RefreshObserver, RefreshOutcome, SubmissionState,
};
