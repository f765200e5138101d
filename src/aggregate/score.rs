//! Weighted campaign performance score

use crate::aggregate::period::PeriodTotals;
use crate::aggregate::round_to;
use crate::rows::{fields, Row, RowExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreWeights {
    pub login: f64,
    pub redeemer: f64,
    pub value: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            login: 0.35,
            redeemer: 0.25,
            value: 0.40,
        }
    }
}

/// Campaign-level targets the ratios are measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignGoal {
    pub target_users: f64,
    pub target_value: f64,
}

impl CampaignGoal {
    pub fn from_rows(rows: &[Row]) -> Self {
        rows.first()
            .map(|row| Self {
                target_users: row.number(fields::TARGET_USERS),
                target_value: row.number(fields::TARGET_VALUE),
            })
            .unwrap_or_default()
    }
}

/// `observed / goal` clamped to `[0, 1]`; a missing goal yields 0.
pub fn goal_ratio(observed: f64, goal: f64) -> f64 {
    if !(goal > 0.0) || !observed.is_finite() {
        return 0.0;
    }
    (observed / goal).clamp(0.0, 1.0)
}

/// `login*w1 + redeemer*w2 + value*w3` over pre-computed ratios.
pub fn weighted_score(weights: &ScoreWeights, login: f64, redeemer: f64, value: f64) -> f64 {
    let score = login.clamp(0.0, 1.0) * weights.login
        + redeemer.clamp(0.0, 1.0) * weights.redeemer
        + value.clamp(0.0, 1.0) * weights.value;
    round_to(score, 4)
}

/// Score of one period's (or cumulative) totals against the campaign goal.
pub fn totals_score(weights: &ScoreWeights, totals: &PeriodTotals, goal: &CampaignGoal) -> f64 {
    weighted_score(
        weights,
        goal_ratio(totals.login_users, goal.target_users),
        goal_ratio(totals.redeemers, goal.target_users),
        goal_ratio(totals.tracked_value, goal.target_value),
    )
}

/// Descending by score, then ascending by name.
pub fn rank_descending<T>(items: &mut [T], score: impl Fn(&T) -> f64, name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| name(a).cmp(name(b)))
    });
}
