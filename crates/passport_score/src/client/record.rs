//! Typed score records as handed to the refresh loop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider id → weight (maximum points the provider's stamp can contribute).
pub type Weights = BTreeMap<String, f64>;

/// Provider id → points earned by the holder's stamp for that provider.
pub type StampScores = BTreeMap<String, f64>;

/// Server-side stage of a score computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    #[default]
    #[serde(alias = "APP_INITIAL")]
    Initial,
    BulkProcessing,
    Processing,
    Error,
    Done,
}

impl ProcessingStatus {
    /// True while the scorer is still working and the record should be polled again.
    pub fn is_processing(self) -> bool {
        matches!(self, Self::Processing | Self::BulkProcessing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::BulkProcessing => "BULK_PROCESSING",
            Self::Processing => "PROCESSING",
            Self::Error => "ERROR",
            Self::Done => "DONE",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed score from a `DONE` response. Replaced wholesale by the next one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub raw_score: f64,
    pub threshold: f64,
    pub score: f64,
    /// Per-provider breakdown. `None` when the scorer omitted it or sent something
    /// other than an object.
    pub stamp_scores: Option<StampScores>,
}

impl ScoreRecord {
    pub fn is_passing(&self) -> bool {
        self.raw_score > self.threshold
    }

    pub fn description(&self) -> &'static str {
        if self.is_passing() {
            "Passing Score"
        } else {
            "Low Score"
        }
    }
}

/// One score fetch: either a finished record or the stage the scorer reported.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreResponse {
    Scored(ScoreRecord),
    Status(ProcessingStatus),
}

impl ScoreResponse {
    pub fn status(&self) -> ProcessingStatus {
        match self {
            Self::Scored(_) => ProcessingStatus::Done,
            Self::Status(status) => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        let s: ProcessingStatus = serde_json::from_str("\"BULK_PROCESSING\"").unwrap();
        assert_eq!(s, ProcessingStatus::BulkProcessing);
        let s: ProcessingStatus = serde_json::from_str("\"APP_INITIAL\"").unwrap();
        assert_eq!(s, ProcessingStatus::Initial);
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Done).unwrap(),
            "\"DONE\""
        );
        assert!(serde_json::from_str::<ProcessingStatus>("\"QUEUED\"").is_err());
    }

    #[test]
    fn description_requires_strictly_above_threshold() {
        let mut record = ScoreRecord {
            raw_score: 10.0,
            threshold: 10.0,
            ..Default::default()
        };
        assert_eq!(record.description(), "Low Score");
        record.raw_score = 10.5;
        assert_eq!(record.description(), "Passing Score");
    }

    #[test]
    fn scored_response_reports_done() {
        let r = ScoreResponse::Scored(ScoreRecord::default());
        assert_eq!(r.status(), ProcessingStatus::Done);
        assert!(ProcessingStatus::Processing.is_processing());
        assert!(!ProcessingStatus::Error.is_processing());
    }
}
