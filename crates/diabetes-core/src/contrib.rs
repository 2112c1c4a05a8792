//! Static-weight contribution scores.
//!
//! `score = value / feature_max * importance * 100`. This is an approximate,
//! population-level heuristic: importance comes from the forest's impurity
//! decrease and does not depend on the patient, so the score is neither causal
//! nor a Shapley attribution. Values above `feature_max` are not clamped and
//! can push a score past its nominal range.

use crate::artifacts::ImportanceMap;
use crate::config::Config;
use crate::schema::FeatureContribution;
use crate::util::round_dp;

/// Score every schema feature of `row` and sort by score, highest first.
///
/// `row` must be aligned with `importances` (both in schema order). Ties keep
/// schema order.
pub fn score_contributions(
    cfg: &Config,
    importances: &ImportanceMap,
    row: &[f64],
) -> Vec<FeatureContribution> {
    let mut out: Vec<FeatureContribution> = importances
        .iter()
        .zip(row)
        .map(|((key, weight), &value)| {
            let normalized = value / cfg.feature_max(key);
            FeatureContribution {
                feature: cfg.display_name(key).to_string(),
                key: key.to_string(),
                value: round_dp(value, 2),
                score: round_dp(normalized * weight * 100.0, 2),
            }
        })
        .collect();

    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out
}
