//! Analytic Views
//!
//! - campaigns: catalog listing filtered by access
//! - summary: KPI metrics, charts, sample rows
//! - comparison: monthly multi-campaign series with scores
//! - activity: daily series with moving averages
//! - funnel: weekly conversion cohorts
//! - redemptions: amount distribution, merchant pie, heatmap
//! - ip_security: top IPs, anomalies, two-factor adoption

pub mod activity;
pub mod campaigns;
pub mod comparison;
pub mod funnel;
pub mod ip_security;
pub mod redemptions;
pub mod report;
pub mod service;
pub mod summary;

pub use report::*;
pub use service::{InsightsService, ViewRequest};
