//! Decoding of scorer responses. Numeric fields arrive as text and are parsed
//! exactly once here; anything unparsable becomes 0.

use crate::client::record::{ProcessingStatus, ScoreRecord, ScoreResponse, StampScores, Weights};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("DONE response without evidence")]
    MissingEvidence,
    #[error("{0} is not a JSON object")]
    NotAnObject(&'static str),
}

#[derive(Deserialize)]
struct WireScoreResponse {
    status: ProcessingStatus,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    evidence: Option<WireEvidence>,
    #[serde(default)]
    stamp_scores: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvidence {
    #[serde(default)]
    raw_score: Option<Value>,
    #[serde(default)]
    threshold: Option<Value>,
}

/// Longest decimal prefix of `s` after leading whitespace, so `"15 pts"` reads
/// as 15. Trailing text is ignored; a string with no leading digits is `None`.
fn leading_decimal(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let is_digit = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut digits = 0;
    while is_digit(end) {
        end += 1;
        digits += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        let mut frac_end = end + 1;
        while is_digit(frac_end) {
            frac_end += 1;
            digits += 1;
        }
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while is_digit(exp_end) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Parse a string- or number-encoded decimal. Strings are read up to the first
/// non-numeric character. Missing, unparsable, and non-finite values yield 0.0.
pub fn parse_float_or_zero(value: &Value) -> f64 {
    let parsed = match value {
        Value::String(s) => leading_decimal(s),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_opt(value: Option<&Value>) -> f64 {
    value.map(parse_float_or_zero).unwrap_or(0.0)
}

fn decimal_map(value: &Value) -> Option<StampScores> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .map(|(k, v)| (k.clone(), parse_float_or_zero(v)))
            .collect(),
    )
}

/// Decode a `/score/{address}` body.
pub fn decode_score_response(body: &str) -> Result<ScoreResponse, NormalizeError> {
    let wire: WireScoreResponse = serde_json::from_str(body)?;
    if wire.status != ProcessingStatus::Done {
        return Ok(ScoreResponse::Status(wire.status));
    }
    let evidence = wire.evidence.ok_or(NormalizeError::MissingEvidence)?;
    Ok(ScoreResponse::Scored(ScoreRecord {
        raw_score: parse_opt(evidence.raw_score.as_ref()),
        threshold: parse_opt(evidence.threshold.as_ref()),
        score: parse_opt(wire.score.as_ref()),
        stamp_scores: wire.stamp_scores.as_ref().and_then(decimal_map),
    }))
}

/// Decode a `/weights` body (provider id → decimal text).
pub fn decode_weights(body: &str) -> Result<Weights, NormalizeError> {
    let value: Value = serde_json::from_str(body)?;
    decimal_map(&value).ok_or(NormalizeError::NotAnObject("weights"))
}
