//! Period-keyed accumulation of independently executed query streams

use crate::rows::{fields, parse_date, Row, RowExt};
use chrono::{Datelike, Duration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time bucket of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGrain {
    Day,
    /// Monday-start week, keyed by its Monday.
    Week,
    Month,
}

impl PeriodGrain {
    /// SQL expression bucketing `column`; avoids `%` so `%s` binding stays unambiguous.
    pub fn bucket_sql(&self, column: &str) -> String {
        match self {
            PeriodGrain::Day => format!("DATE({})", column),
            PeriodGrain::Week => format!(
                "DATE_SUB(DATE({}), INTERVAL WEEKDAY({}) DAY)",
                column, column
            ),
            PeriodGrain::Month => format!("LEFT({}, 7)", column),
        }
    }

    /// Canonical zero-padded key for a raw period value, so keys sort chronologically.
    pub fn normalize_key(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        match self {
            PeriodGrain::Day => parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string()),
            PeriodGrain::Week => parse_date(raw).map(|d| {
                let monday = d - Duration::days(d.weekday().num_days_from_monday() as i64);
                monday.format("%Y-%m-%d").to_string()
            }),
            PeriodGrain::Month => {
                let month = raw.get(..7)?;
                chrono::NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
                    .ok()
                    .map(|d| d.format("%Y-%m").to_string())
            }
        }
    }
}

/// Additive quantity contributed by a query stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    Registrations,
    Logins,
    LoginUsers,
    Redemptions,
    Redeemers,
    RedeemedValue,
    Winners,
    Transactions,
    TrackedValue,
}

impl Measure {
    /// Row field the stream selects this measure as.
    pub fn field(&self) -> &'static str {
        match self {
            Measure::Registrations => fields::REGISTRATIONS,
            Measure::Logins => fields::LOGINS,
            Measure::LoginUsers => fields::LOGIN_USERS,
            Measure::Redemptions => fields::REDEMPTIONS,
            Measure::Redeemers => fields::REDEEMERS,
            Measure::RedeemedValue => fields::REDEEMED_VALUE,
            Measure::Winners => fields::WINNERS,
            Measure::Transactions => fields::TRANSACTIONS,
            Measure::TrackedValue => fields::TRACKED_VALUE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub registrations: f64,
    pub logins: f64,
    pub login_users: f64,
    pub redemptions: f64,
    pub redeemers: f64,
    pub redeemed_value: f64,
    pub winners: f64,
    pub transactions: f64,
    pub tracked_value: f64,
}

impl PeriodTotals {
    pub fn get(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Registrations => self.registrations,
            Measure::Logins => self.logins,
            Measure::LoginUsers => self.login_users,
            Measure::Redemptions => self.redemptions,
            Measure::Redeemers => self.redeemers,
            Measure::RedeemedValue => self.redeemed_value,
            Measure::Winners => self.winners,
            Measure::Transactions => self.transactions,
            Measure::TrackedValue => self.tracked_value,
        }
    }

    fn slot_mut(&mut self, measure: Measure) -> &mut f64 {
        match measure {
            Measure::Registrations => &mut self.registrations,
            Measure::Logins => &mut self.logins,
            Measure::LoginUsers => &mut self.login_users,
            Measure::Redemptions => &mut self.redemptions,
            Measure::Redeemers => &mut self.redeemers,
            Measure::RedeemedValue => &mut self.redeemed_value,
            Measure::Winners => &mut self.winners,
            Measure::Transactions => &mut self.transactions,
            Measure::TrackedValue => &mut self.tracked_value,
        }
    }

    pub fn add(&mut self, measure: Measure, value: f64) {
        *self.slot_mut(measure) += value;
    }

    pub fn accumulate(&mut self, other: &PeriodTotals) {
        self.registrations += other.registrations;
        self.logins += other.logins;
        self.login_users += other.login_users;
        self.redemptions += other.redemptions;
        self.redeemers += other.redeemers;
        self.redeemed_value += other.redeemed_value;
        self.winners += other.winners;
        self.transactions += other.transactions;
        self.tracked_value += other.tracked_value;
    }
}

/// Finalized bucket with running totals up to and including this period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodPoint {
    pub period: String,
    pub totals: PeriodTotals,
    pub cumulative: PeriodTotals,
}

#[derive(Debug, Clone)]
pub struct PeriodAccumulator {
    grain: PeriodGrain,
    buckets: BTreeMap<String, PeriodTotals>,
}

impl PeriodAccumulator {
    pub fn new(grain: PeriodGrain) -> Self {
        Self {
            grain,
            buckets: BTreeMap::new(),
        }
    }

    pub fn grain(&self) -> PeriodGrain {
        self.grain
    }

    /// Add to a bucket, creating it on first touch. Unparseable keys are dropped.
    pub fn add(&mut self, period: &str, measure: Measure, value: f64) -> bool {
        match self.grain.normalize_key(period) {
            Some(key) => {
                self.buckets.entry(key).or_default().add(measure, value);
                true
            }
            None => false,
        }
    }

    /// Merge a result set keyed by the `period` field. Returns rows merged.
    pub fn merge_rows(&mut self, rows: &[Row], measures: &[Measure]) -> usize {
        let mut merged = 0;
        for row in rows {
            let Some(key) = row
                .text(fields::PERIOD)
                .and_then(|raw| self.grain.normalize_key(&raw))
            else {
                continue;
            };
            let bucket = self.buckets.entry(key).or_default();
            for measure in measures {
                bucket.add(*measure, row.number(measure.field()));
            }
            merged += 1;
        }
        merged
    }

    /// Fold another accumulator of the same grain into this one.
    pub fn merge(&mut self, other: PeriodAccumulator) {
        for (key, totals) in other.buckets {
            self.buckets.entry(key).or_default().accumulate(&totals);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Points in key order with running totals.
    pub fn finalize(self) -> Vec<PeriodPoint> {
        let mut running = PeriodTotals::default();
        self.buckets
            .into_iter()
            .map(|(period, totals)| {
                running.accumulate(&totals);
                PeriodPoint {
                    period,
                    totals,
                    cumulative: running,
                }
            })
            .collect()
    }
}
