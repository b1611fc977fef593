//! Scorer API boundary: HTTP fetching, weights cache, and wire normalization.

mod cache;
pub(crate) mod fetch;
mod normalize;
mod record;

pub use cache::{Cache, CacheError, CachedBody};
pub use fetch::{FetchConfig, FetchError, Fetcher, ScoreClient};
pub use normalize::{decode_score_response, decode_weights, parse_float_or_zero, NormalizeError};
pub use record::{ProcessingStatus, ScoreRecord, ScoreResponse, StampScores, Weights};
