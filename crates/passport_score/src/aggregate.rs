//! Per-platform point totals from provider weights and earned stamp scores.

use crate::catalog::PlatformCatalogEntry;
use crate::client::{StampScores, Weights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalog platform with its possible and earned points. Always derived, never stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformScore {
    #[serde(flatten)]
    pub platform: PlatformCatalogEntry,
    pub possible_points: f64,
    pub earned_points: f64,
}

fn points(map: &BTreeMap<String, f64>, provider_id: &str) -> f64 {
    map.get(provider_id)
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(0.0)
}

/// Sum weights and stamp scores over each platform's providers, in catalog order.
///
/// Without both weights and stamp scores every platform scores zero.
pub fn aggregate(
    catalog: &[PlatformCatalogEntry],
    weights: Option<&Weights>,
    stamp_scores: Option<&StampScores>,
) -> Vec<PlatformScore> {
    catalog
        .iter()
        .map(|entry| {
            let (possible_points, earned_points) = match (weights, stamp_scores) {
                (Some(weights), Some(scores)) => entry.provider_ids().fold(
                    (0.0, 0.0),
                    |(possible, earned), id| {
                        (possible + points(weights, id), earned + points(scores, id))
                    },
                ),
                _ => (0.0, 0.0),
            };
            PlatformScore {
                platform: entry.clone(),
                possible_points,
                earned_points,
            }
        })
        .collect()
}
