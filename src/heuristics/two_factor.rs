//! Weekly two-factor adoption
//!
//! The base fragment flags each `(week, segment, idmask)` with whether the
//! user had completed a two-step auth by the end of that week. It is filtered like any other
//! fragment, then wrapped in a rollup that counts adopters per week and
//! segment. Only the most recent weeks are kept.

use crate::aggregate::{round_to, safe_ratio, PeriodGrain};
use crate::catalog::fragments::two_factor_base;
use crate::error::Result;
use crate::filters::{FilterInjector, FilterSet};
use crate::query::{substitute_database, ComposedQuery, DateRange};
use crate::rows::{fields, parse_date, Row, RowExt};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const UNASSIGNED_SEGMENT: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdoptionSettings {
    /// Most recent weeks retained.
    pub weeks: usize,
    /// Reference line attached to the output.
    pub target_rate: f64,
}

impl Default for AdoptionSettings {
    fn default() -> Self {
        Self {
            weeks: 12,
            target_rate: 0.70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorAdoptionEntry {
    pub week_start: String,
    pub week_end: String,
    pub segment: String,
    pub users_with_two_factor: u64,
    pub total_users: u64,
    pub adoption_rate: f64,
}

/// All segments of one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAdoption {
    pub week_start: String,
    pub week_end: String,
    pub users_with_two_factor: u64,
    pub total_users: u64,
    pub adoption_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorAdoption {
    pub entries: Vec<TwoFactorAdoptionEntry>,
    pub weeks: Vec<WeeklyAdoption>,
    pub target_rate: f64,
}

/// Filtered base fragment wrapped in the weekly rollup, ready for `database`.
pub fn adoption_query(
    injector: &FilterInjector,
    database: &str,
    filters: &FilterSet,
    range: Option<&DateRange>,
) -> Result<ComposedQuery> {
    let base = two_factor_base();
    let inner = injector.build(&base.spec(), filters, range).to_query();
    let sql = format!(
        "SELECT week_start, segment, SUM(has_two_factor) AS users_with_two_factor, \
         COUNT(DISTINCT idmask) AS total_users FROM ({}) AS weekly \
         GROUP BY week_start, segment ORDER BY week_start DESC;",
        inner.sql
    );
    Ok(ComposedQuery::new(
        substitute_database(&sql, database)?,
        inner.params,
    ))
}

/// Keep the most recent `settings.weeks` week starts, ascending.
pub fn summarize(rows: &[Row], settings: &AdoptionSettings) -> TwoFactorAdoption {
    let mut cells: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
    for row in rows {
        let Some(week) = row
            .text(fields::WEEK_START)
            .and_then(|raw| PeriodGrain::Week.normalize_key(&raw))
        else {
            continue;
        };
        let segment = row
            .text(fields::SEGMENT)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNASSIGNED_SEGMENT.to_string());
        let cell = cells.entry((week, segment)).or_default();
        cell.0 += row.count(fields::USERS_WITH_TWO_FACTOR);
        cell.1 += row.count(fields::TOTAL_USERS);
    }

    let all_weeks: BTreeSet<&String> = cells.keys().map(|(week, _)| week).collect();
    let kept: BTreeSet<String> = all_weeks
        .into_iter()
        .rev()
        .take(settings.weeks)
        .cloned()
        .collect();

    let mut entries = Vec::new();
    let mut weekly: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for ((week, segment), (adopted, total)) in cells {
        if !kept.contains(&week) {
            continue;
        }
        let totals = weekly.entry(week.clone()).or_default();
        totals.0 += adopted;
        totals.1 += total;
        entries.push(TwoFactorAdoptionEntry {
            week_end: week_end(&week),
            week_start: week,
            segment,
            users_with_two_factor: adopted,
            total_users: total,
            adoption_rate: rate(adopted, total),
        });
    }

    let weeks = weekly
        .into_iter()
        .map(|(week, (adopted, total))| WeeklyAdoption {
            week_end: week_end(&week),
            week_start: week,
            users_with_two_factor: adopted,
            total_users: total,
            adoption_rate: rate(adopted, total),
        })
        .collect();

    TwoFactorAdoption {
        entries,
        weeks,
        target_rate: settings.target_rate,
    }
}

fn rate(adopted: u64, total: u64) -> f64 {
    round_to(safe_ratio(adopted as f64, total as f64), 4)
}

fn week_end(week_start: &str) -> String {
    parse_date(week_start)
        .map(|d| (d + Duration::days(6)).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
