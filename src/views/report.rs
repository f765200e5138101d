//! Typed view outputs

use crate::aggregate::{CampaignGoal, PeriodTotals};
use crate::catalog::Campaign;
use crate::filters::FilterSet;
use crate::heuristics::{AmountBucket, AtypicalIpRecord, Heatmap, MerchantSlice, TwoFactorAdoption};
use crate::query::DateRange;
use crate::rows::{fields, Row, RowExt};
use crate::views::service::ViewRequest;
use serde::Serialize;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub metrics: Vec<String>,
    pub charts: Vec<String>,
}

impl From<&Campaign> for CampaignInfo {
    fn from(campaign: &Campaign) -> Self {
        Self {
            id: campaign.id.clone(),
            name: campaign.name.clone(),
            description: campaign.description.clone(),
            metrics: campaign.metrics.iter().map(|m| m.key.clone()).collect(),
            charts: campaign.charts.iter().map(|c| c.key.clone()).collect(),
        }
    }
}

/// Echo of the filters a view was computed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRange>,
    #[serde(flatten)]
    pub filters: FilterSet,
}

impl From<&ViewRequest> for AppliedFilters {
    fn from(request: &ViewRequest) -> Self {
        Self {
            range: request.range,
            filters: request.filters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub key: String,
    pub label: String,
    /// Absent when the metric query failed.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub key: String,
    pub title: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaign: CampaignInfo,
    pub filters: AppliedFilters,
    pub metrics: Vec<MetricValue>,
    pub charts: Vec<ChartData>,
    pub sample: Vec<Row>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub month: String,
    pub totals: PeriodTotals,
    pub cumulative: PeriodTotals,
    pub score: f64,
    pub cumulative_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignComparison {
    pub campaign_id: String,
    pub name: String,
    pub goal: CampaignGoal,
    pub months: Vec<MonthlyPoint>,
    /// Cumulative score of the latest month; 0 without data.
    pub latest_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetadata {
    pub requested: usize,
    pub returned: usize,
    pub filters: AppliedFilters,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Ranked by latest cumulative score, ties by name.
    pub campaigns: Vec<CampaignComparison>,
    pub metadata: ComparisonMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivityPoint {
    pub date: String,
    pub registrations: f64,
    pub logins: f64,
    pub login_users: f64,
    pub redemptions: f64,
    pub redeemers: f64,
    pub redeemed_value: f64,
    pub winners: f64,
    pub logins_moving_average: Option<f64>,
    pub redemptions_moving_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub campaign: CampaignInfo,
    pub filters: AppliedFilters,
    pub window: usize,
    pub days: Vec<DailyActivityPoint>,
    pub totals: PeriodTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStages {
    pub registered: f64,
    pub logged_in: f64,
    pub redeemed: f64,
    pub awarded: f64,
    pub login_rate: f64,
    pub redemption_rate: f64,
    pub award_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelWeek {
    pub week_start: String,
    pub week_end: String,
    #[serde(flatten)]
    pub stages: FunnelStages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelReport {
    /// `all` or the requested campaign ids.
    pub scope: String,
    pub campaigns: Vec<CampaignInfo>,
    pub filters: AppliedFilters,
    pub weeks: Vec<FunnelWeek>,
    pub totals: FunnelStages,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionReport {
    pub campaign: CampaignInfo,
    pub filters: AppliedFilters,
    pub total_redemptions: u64,
    pub total_value: f64,
    pub amounts: Vec<AmountBucket>,
    pub merchants: Vec<MerchantSlice>,
    pub heatmap: Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpActivity {
    pub ip: String,
    pub logins: u64,
    pub unique_users: u64,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

impl IpActivity {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            ip: row.text(fields::IP)?,
            logins: row.count(fields::LOGINS),
            unique_users: row.count(fields::UNIQUE_USERS),
            first_seen: formatted_timestamp(row, fields::FIRST_SEEN),
            last_seen: formatted_timestamp(row, fields::LAST_SEEN),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpUserActivity {
    pub ip: String,
    pub idmask: String,
    pub logins: u64,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

impl IpUserActivity {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            ip: row.text(fields::IP)?,
            idmask: row.text(fields::IDMASK)?,
            logins: row.count(fields::LOGINS),
            first_seen: formatted_timestamp(row, fields::FIRST_SEEN),
            last_seen: formatted_timestamp(row, fields::LAST_SEEN),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub campaign: CampaignInfo,
    pub filters: AppliedFilters,
    pub top_ips: Vec<IpActivity>,
    pub ip_users: Vec<IpUserActivity>,
    pub anomalies: Vec<AtypicalIpRecord>,
    pub redemption_ips_tracked: bool,
    pub two_factor: Option<TwoFactorAdoption>,
    pub notes: Vec<String>,
}

fn formatted_timestamp(row: &Row, field: &str) -> Option<String> {
    row.timestamp(field)
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ip_records_from_rows() {
        let row = json!({
            "ip": "10.1.1.1", "idmask": "u-1", "logins": "7", "unique_users": 3,
            "first_seen": "2024-03-01T10:00:00", "last_seen": null,
        })
        .as_object()
        .cloned()
        .unwrap();

        let ip = IpActivity::from_row(&row).unwrap();
        assert_eq!(ip.logins, 7);
        assert_eq!(ip.first_seen.as_deref(), Some("2024-03-01 10:00:00"));
        assert_eq!(ip.last_seen, None);

        let detail = IpUserActivity::from_row(&row).unwrap();
        assert_eq!(detail.idmask, "u-1");

        let missing_ip = json!({"logins": 1}).as_object().cloned().unwrap();
        assert!(IpActivity::from_row(&missing_ip).is_none());
    }

    #[test]
    fn test_applied_filters_serialize_flat() {
        let request = ViewRequest::new(
            Some("2024-01-01"),
            Some("2024-01-31"),
            FilterSet::new().with_login_type("1"),
        );
        let value = serde_json::to_value(AppliedFilters::from(&request)).unwrap();
        assert_eq!(value["loginType"], json!("1"));
        assert_eq!(value["range"]["from"], json!("2024-01-01"));
    }
}
