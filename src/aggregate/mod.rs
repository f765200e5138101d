//! Aggregation Module - merging per-stream results into series

pub mod moving_average;
pub mod period;
pub mod score;

pub use moving_average::moving_average;
pub use period::{Measure, PeriodAccumulator, PeriodGrain, PeriodPoint, PeriodTotals};
pub use score::{goal_ratio, rank_descending, totals_score, weighted_score, CampaignGoal, ScoreWeights};

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `numerator / denominator`, 0 when the denominator is not positive.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
