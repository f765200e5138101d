//! Atypical IP detection
//!
//! Per-IP login and redemption aggregates are folded into [`IpTotals`] and run
//! through an ordered rule set. Each matching rule contributes one reason;
//! the number of reasons decides the severity and IPs without any reason are
//! not reported.

use crate::aggregate::{round_to, safe_ratio};
use crate::rows::{fields, Row, RowExt};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Rule thresholds. Hand-tuned values, kept configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnomalyThresholds {
    pub volume_redemptions: u64,
    pub dominant_share: f64,
    pub dominant_min_redemptions: u64,
    pub short_span_days: f64,
    pub short_span_min_redemptions: u64,
    pub conversion_rate: f64,
    pub conversion_min_logins: u64,
    pub conversion_min_redemptions: u64,
    pub shared_min_login_users: u64,
    pub shared_max_redeemers: u64,
    pub shared_min_redemptions: u64,
    pub daily_rate: f64,
    pub daily_rate_min_redemptions: u64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            volume_redemptions: 12,
            dominant_share: 0.7,
            dominant_min_redemptions: 5,
            short_span_days: 2.0,
            short_span_min_redemptions: 5,
            conversion_rate: 0.6,
            conversion_min_logins: 10,
            conversion_min_redemptions: 5,
            shared_min_login_users: 5,
            shared_max_redeemers: 2,
            shared_min_redemptions: 4,
            daily_rate: 2.0,
            daily_rate_min_redemptions: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_reason_count(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Severity::Low),
            2 => Some(Severity::Medium),
            _ => Some(Severity::High),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpTotals {
    pub logins: u64,
    pub unique_users: u64,
    pub redemptions: u64,
    pub unique_redeemers: u64,
    /// Largest single-idmask share of the IP's redemptions.
    pub dominant_share: f64,
    /// Calendar days between first and last redemption, inclusive.
    pub redemption_span_days: Option<f64>,
    pub login_span_days: Option<f64>,
    pub active_days: u64,
    pub redemptions_per_active_day: f64,
}

impl IpTotals {
    pub fn conversion(&self) -> f64 {
        safe_ratio(self.redemptions as f64, self.logins as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtypicalIpRecord {
    pub ip: String,
    pub totals: IpTotals,
    pub reasons: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer {
    thresholds: AnomalyThresholds,
}

impl AnomalyScorer {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    /// Merge the three per-IP result sets and score every IP seen.
    ///
    /// `logins_by_ip`: `ip, logins, unique_users, first_seen, last_seen`.
    /// `redemptions_by_ip`: `ip, redemptions, redeemers, first_seen, last_seen, active_days`.
    /// `redemptions_by_ip_idmask`: `ip, idmask, redemptions`.
    pub fn score_rows(
        &self,
        logins_by_ip: &[Row],
        redemptions_by_ip: &[Row],
        redemptions_by_ip_idmask: &[Row],
    ) -> Vec<AtypicalIpRecord> {
        let mut totals: BTreeMap<String, IpTotals> = BTreeMap::new();

        for row in logins_by_ip {
            let Some(ip) = ip_key(row) else { continue };
            let entry = totals.entry(ip).or_default();
            entry.logins += row.count(fields::LOGINS);
            entry.unique_users += row.count(fields::UNIQUE_USERS);
            entry.login_span_days = span_days(
                row.timestamp(fields::FIRST_SEEN),
                row.timestamp(fields::LAST_SEEN),
            );
        }

        for row in redemptions_by_ip {
            let Some(ip) = ip_key(row) else { continue };
            let entry = totals.entry(ip).or_default();
            entry.redemptions += row.count(fields::REDEMPTIONS);
            entry.unique_redeemers += row.count(fields::REDEEMERS);
            entry.active_days += row.count(fields::ACTIVE_DAYS);
            entry.redemption_span_days = span_days(
                row.timestamp(fields::FIRST_SEEN),
                row.timestamp(fields::LAST_SEEN),
            );
        }

        let mut dominant: HashMap<String, u64> = HashMap::new();
        for row in redemptions_by_ip_idmask {
            let Some(ip) = ip_key(row) else { continue };
            let count = row.count(fields::REDEMPTIONS);
            let max = dominant.entry(ip).or_default();
            *max = (*max).max(count);
        }

        for (ip, entry) in totals.iter_mut() {
            entry.dominant_share = match dominant.get(ip) {
                Some(max) => round_to(safe_ratio(*max as f64, entry.redemptions as f64).min(1.0), 4),
                None if entry.unique_redeemers == 1 && entry.redemptions > 0 => 1.0,
                None => 0.0,
            };
            let active_days = if entry.active_days > 0 {
                entry.active_days as f64
            } else {
                entry
                    .redemption_span_days
                    .map(|span| span.ceil().max(1.0))
                    .unwrap_or(0.0)
            };
            entry.redemptions_per_active_day =
                round_to(safe_ratio(entry.redemptions as f64, active_days), 2);
        }

        self.score(totals)
    }

    /// Score prepared totals; output ordered by severity, redemptions desc, IP.
    pub fn score(&self, totals: impl IntoIterator<Item = (String, IpTotals)>) -> Vec<AtypicalIpRecord> {
        let mut records: Vec<AtypicalIpRecord> = totals
            .into_iter()
            .filter_map(|(ip, totals)| {
                let reasons = self.evaluate(&totals);
                Severity::from_reason_count(reasons.len()).map(|severity| AtypicalIpRecord {
                    ip,
                    totals,
                    reasons,
                    severity,
                })
            })
            .collect();

        records.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| b.totals.redemptions.cmp(&a.totals.redemptions))
                .then_with(|| a.ip.cmp(&b.ip))
        });
        records
    }

    /// Reasons matched by `totals`, in rule order.
    pub fn evaluate(&self, totals: &IpTotals) -> Vec<String> {
        let t = &self.thresholds;
        let mut reasons = Vec::new();

        if totals.redemptions >= t.volume_redemptions {
            reasons.push(format!(
                "High redemption volume ({} redemptions)",
                totals.redemptions
            ));
        }
        if totals.dominant_share >= t.dominant_share
            && totals.redemptions >= t.dominant_min_redemptions
        {
            reasons.push(format!(
                "Single user accounts for {:.0}% of redemptions",
                totals.dominant_share * 100.0
            ));
        }
        if let Some(span) = totals.redemption_span_days {
            if span <= t.short_span_days && totals.redemptions >= t.short_span_min_redemptions {
                reasons.push(format!(
                    "{} redemptions within {} day(s)",
                    totals.redemptions, span
                ));
            }
        }
        let conversion = totals.conversion();
        if conversion >= t.conversion_rate
            && totals.logins >= t.conversion_min_logins
            && totals.redemptions >= t.conversion_min_redemptions
        {
            reasons.push(format!(
                "Login to redemption conversion of {:.0}%",
                conversion * 100.0
            ));
        }
        if totals.unique_users >= t.shared_min_login_users
            && totals.unique_redeemers <= t.shared_max_redeemers
            && totals.redemptions >= t.shared_min_redemptions
        {
            reasons.push(format!(
                "{} users logged in but only {} redeemed",
                totals.unique_users, totals.unique_redeemers
            ));
        }
        if totals.redemptions_per_active_day >= t.daily_rate
            && totals.redemptions >= t.daily_rate_min_redemptions
        {
            reasons.push(format!(
                "{:.2} redemptions per active day",
                totals.redemptions_per_active_day
            ));
        }
        reasons
    }
}

fn ip_key(row: &Row) -> Option<String> {
    row.text(fields::IP)
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Elapsed time between first and last event, in fractional days.
fn span_days(first: Option<NaiveDateTime>, last: Option<NaiveDateTime>) -> Option<f64> {
    let (first, last) = (first?, last?);
    let seconds = (last - first).num_seconds().abs() as f64;
    Some(round_to(seconds / SECONDS_PER_DAY, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_single_redeemer_burst_is_high() {
        let scorer = AnomalyScorer::default();
        let totals = IpTotals {
            redemptions: 20,
            unique_redeemers: 1,
            dominant_share: 1.0,
            redemption_span_days: Some(1.0),
            active_days: 1,
            redemptions_per_active_day: 20.0,
            ..Default::default()
        };
        let reasons = scorer.evaluate(&totals);
        assert!(reasons.len() >= 3);
        assert!(reasons[0].contains("volume"));
        assert!(reasons[1].contains("100%"));
        assert!(reasons[2].contains("within 1 day"));

        let records = scorer.score(vec![("10.0.0.9".to_string(), totals)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::High);
    }

    #[test]
    fn test_quiet_ip_is_excluded() {
        let scorer = AnomalyScorer::default();
        let totals = IpTotals {
            logins: 40,
            unique_users: 3,
            redemptions: 2,
            unique_redeemers: 2,
            dominant_share: 0.5,
            redemption_span_days: Some(30.0),
            active_days: 2,
            redemptions_per_active_day: 1.0,
            ..Default::default()
        };
        assert!(scorer.evaluate(&totals).is_empty());
        assert!(scorer.score(vec![("10.0.0.1".to_string(), totals)]).is_empty());
    }

    #[test]
    fn test_score_rows_merges_streams_and_orders() {
        let scorer = AnomalyScorer::default();
        let logins = rows(vec![
            json!({"ip": "1.1.1.1", "logins": 12, "unique_users": 6,
                   "first_seen": "2024-03-01 08:00:00", "last_seen": "2024-03-20 08:00:00"}),
            json!({"ip": "2.2.2.2", "logins": 3, "unique_users": 1}),
        ]);
        let redemptions = rows(vec![
            json!({"ip": "1.1.1.1", "redemptions": 8, "redeemers": 2, "active_days": 8,
                   "first_seen": "2024-03-01 09:00:00", "last_seen": "2024-03-20 09:00:00"}),
            json!({"ip": "2.2.2.2", "redemptions": "6", "redeemers": 1, "active_days": 1,
                   "first_seen": "2024-03-05 09:00:00", "last_seen": "2024-03-05 10:00:00"}),
        ]);
        let per_idmask = rows(vec![
            json!({"ip": "1.1.1.1", "idmask": "a", "redemptions": 4}),
            json!({"ip": "1.1.1.1", "idmask": "b", "redemptions": 4}),
            json!({"ip": "2.2.2.2", "idmask": "c", "redemptions": 6}),
        ]);

        let records = scorer.score_rows(&logins, &redemptions, &per_idmask);
        assert_eq!(records.len(), 2);

        // share, span, daily rate
        assert_eq!(records[0].ip, "2.2.2.2");
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].totals.dominant_share, 1.0);
        assert_eq!(records[0].totals.redemption_span_days, Some(0.04));

        // conversion 8/12, six login users with two redeemers
        assert_eq!(records[1].ip, "1.1.1.1");
        assert_eq!(records[1].severity, Severity::Medium);
        assert_eq!(records[1].totals.dominant_share, 0.5);
        assert_eq!(records[1].totals.login_span_days, Some(19.0));
    }

    #[test]
    fn test_overnight_burst_counts_elapsed_time() {
        let scorer = AnomalyScorer::default();
        let burst = |first: &str, last: &str| {
            rows(vec![json!({"ip": "3.3.3.3", "redemptions": 5, "redeemers": 5, "active_days": 3,
                              "first_seen": first, "last_seen": last})])
        };

        let overnight = scorer.score_rows(&[], &burst("2024-03-04 23:00:00", "2024-03-06 01:00:00"), &[]);
        assert_eq!(overnight.len(), 1);
        assert_eq!(overnight[0].totals.redemption_span_days, Some(1.08));
        assert_eq!(overnight[0].severity, Severity::Low);

        let spread = scorer.score_rows(&[], &burst("2024-03-04 23:00:00", "2024-03-07 01:00:00"), &[]);
        assert!(spread.is_empty());
    }

    #[test]
    fn test_ties_order_by_redemptions_then_ip() {
        let scorer = AnomalyScorer::default();
        let burst = |redemptions: u64| IpTotals {
            redemptions,
            redemptions_per_active_day: 3.0,
            ..Default::default()
        };
        let records = scorer.score(vec![
            ("b".to_string(), burst(5)),
            ("a".to_string(), burst(5)),
            ("c".to_string(), burst(9)),
        ]);
        let ips: Vec<&str> = records.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(ips, vec!["c", "a", "b"]);
        assert!(records.iter().all(|r| r.severity == Severity::Low));
    }

    #[test]
    fn test_custom_thresholds() {
        let scorer = AnomalyScorer::new(AnomalyThresholds {
            volume_redemptions: 3,
            ..Default::default()
        });
        let totals = IpTotals {
            redemptions: 3,
            ..Default::default()
        };
        assert_eq!(scorer.evaluate(&totals).len(), 1);
    }
}
