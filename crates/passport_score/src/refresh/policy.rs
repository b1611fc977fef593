use crate::client::StampScores;

/// Whether a fetched record must be recomputed before it is accepted.
///
/// A positive raw score with no per-stamp breakdown is an inconsistent record the
/// scorer repairs on rescore. Once a rescore is underway it is never forced again.
pub fn needs_rescore(
    currently_rescoring: bool,
    raw_score: f64,
    stamp_scores: Option<&StampScores>,
) -> bool {
    if raw_score.is_nan() || raw_score <= 0.0 || currently_rescoring {
        return false;
    }
    stamp_scores.filter(|s| !s.is_empty()).is_none()
}
