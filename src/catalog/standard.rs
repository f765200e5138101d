//! Metric and chart set every campaign schema supports

use crate::catalog::campaign::{ChartDefinition, MetricDefinition};
use crate::catalog::fragments::{EVENT_DATE_COLUMN, REGISTRATION_DATE_COLUMN};

pub const SAMPLE_QUERY: &str = "SELECT l.id, l.idmask, l.ip, l.type, l.date \
     FROM {db}.mc_logins l ORDER BY l.date DESC LIMIT 20";
pub const SAMPLE_DATE_COLUMN: &str = "l.date";

pub fn standard_metrics() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new(
            "total_users",
            "Registered users",
            "SELECT COUNT(*) AS value FROM {db}.mc_users",
        )
        .dated(REGISTRATION_DATE_COLUMN),
        MetricDefinition::new(
            "total_logins",
            "Logins",
            "SELECT COUNT(*) AS value FROM {db}.mc_logins",
        )
        .dated(EVENT_DATE_COLUMN),
        MetricDefinition::new(
            "unique_login_users",
            "Users who logged in",
            "SELECT COUNT(DISTINCT idmask) AS value FROM {db}.mc_logins",
        )
        .dated(EVENT_DATE_COLUMN),
        MetricDefinition::new(
            "total_redemptions",
            "Redemptions",
            "SELECT COUNT(*) AS value FROM {db}.mc_redemptions",
        )
        .dated(EVENT_DATE_COLUMN),
        MetricDefinition::new(
            "redeemed_value",
            "Redeemed value",
            "SELECT COALESCE(SUM(amount), 0) AS value FROM {db}.mc_redemptions",
        )
        .dated(EVENT_DATE_COLUMN),
        MetricDefinition::new(
            "winners",
            "Award winners",
            "SELECT COUNT(DISTINCT idmask) AS value FROM {db}.mc_awards_logs",
        )
        .dated(EVENT_DATE_COLUMN),
        MetricDefinition::new(
            "two_factor_users",
            "Users with two-step auth",
            "SELECT COUNT(DISTINCT idmask) AS value FROM {db}.mc_two_step_auths",
        )
        .dated(EVENT_DATE_COLUMN),
    ]
}

pub fn standard_charts() -> Vec<ChartDefinition> {
    vec![
        ChartDefinition::new(
            "logins_by_type",
            "Logins by type",
            "SELECT type AS label, COUNT(*) AS value FROM {db}.mc_logins \
             GROUP BY type ORDER BY value DESC",
        )
        .dated(EVENT_DATE_COLUMN),
        ChartDefinition::new(
            "redemptions_by_merchant",
            "Top merchants",
            "SELECT merchant AS label, COUNT(*) AS value FROM {db}.mc_redemptions \
             GROUP BY merchant ORDER BY value DESC LIMIT 10",
        )
        .dated(EVENT_DATE_COLUMN),
        ChartDefinition::new(
            "users_by_segment",
            "Users by segment",
            "SELECT COALESCE(segment, 'unassigned') AS label, COUNT(*) AS value \
             FROM {db}.mc_users GROUP BY label ORDER BY value DESC",
        )
        .dated(REGISTRATION_DATE_COLUMN),
        ChartDefinition::new(
            "logins_by_month",
            "Logins per month",
            "SELECT LEFT(date, 7) AS label, COUNT(*) AS value FROM {db}.mc_logins \
             GROUP BY label ORDER BY label",
        )
        .dated(EVENT_DATE_COLUMN),
    ]
}
