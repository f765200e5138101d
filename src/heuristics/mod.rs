//! Heuristic engines over merged aggregates

pub mod anomaly;
pub mod heatmap;
pub mod two_factor;

pub use anomaly::{AnomalyScorer, AnomalyThresholds, AtypicalIpRecord, IpTotals, Severity};
pub use heatmap::{
    amount_distribution, amount_label, merchant_amount_heatmap, merchant_pie, AmountBucket,
    BreakdownSettings, Heatmap, MerchantSlice,
};
pub use two_factor::{
    AdoptionSettings, TwoFactorAdoption, TwoFactorAdoptionEntry, WeeklyAdoption,
};
