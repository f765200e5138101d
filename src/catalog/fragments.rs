//! Built-in SQL fragments
//!
//! Every fragment selects the column aliases defined in [`crate::rows::fields`]
//! so the consuming view can read rows by constant. Templates stay free of `%`
//! literals; `%s` is reserved for positional parameters.

use crate::aggregate::{Measure, PeriodGrain};
use crate::filters::capability::{
    AWARDS_TABLE, LOGINS_TABLE, REDEMPTIONS_TABLE, TRACINGS_TABLE, USERS_TABLE,
};
use crate::query::FragmentSpec;

pub const EVENT_DATE_COLUMN: &str = "date";
pub const REGISTRATION_DATE_COLUMN: &str = "created_at";

/// A template with the base table and date column it is filtered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub template: String,
    pub base_table: &'static str,
    pub date_column: Option<&'static str>,
}

impl Fragment {
    pub fn new(template: impl Into<String>, base_table: &'static str) -> Self {
        Self {
            template: template.into(),
            base_table,
            date_column: None,
        }
    }

    pub fn dated(mut self, column: &'static str) -> Self {
        self.date_column = Some(column);
        self
    }

    pub fn spec(&self) -> FragmentSpec<'_> {
        let spec = FragmentSpec::new(&self.template).with_base_table(self.base_table);
        match self.date_column {
            Some(column) => spec.with_date_column(column),
            None => spec,
        }
    }
}

/// Event stream merged into a period series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Registrations,
    Logins,
    Redemptions,
    Awards,
    Tracings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStream {
    pub kind: StreamKind,
    pub fragment: Fragment,
    pub measures: &'static [Measure],
}

const REGISTRATION_MEASURES: &[Measure] = &[Measure::Registrations];
const LOGIN_MEASURES: &[Measure] = &[Measure::Logins, Measure::LoginUsers];
const REDEMPTION_MEASURES: &[Measure] =
    &[Measure::Redemptions, Measure::Redeemers, Measure::RedeemedValue];
const AWARD_MEASURES: &[Measure] = &[Measure::Winners];
const TRACING_MEASURES: &[Measure] = &[Measure::Transactions, Measure::TrackedValue];

pub fn period_stream(kind: StreamKind, grain: PeriodGrain) -> PeriodStream {
    let (select, table, date_column, measures) = match kind {
        StreamKind::Registrations => (
            "COUNT(*) AS registrations",
            USERS_TABLE,
            REGISTRATION_DATE_COLUMN,
            REGISTRATION_MEASURES,
        ),
        StreamKind::Logins => (
            "COUNT(*) AS logins, COUNT(DISTINCT idmask) AS login_users",
            LOGINS_TABLE,
            EVENT_DATE_COLUMN,
            LOGIN_MEASURES,
        ),
        StreamKind::Redemptions => (
            "COUNT(*) AS redemptions, COUNT(DISTINCT idmask) AS redeemers, \
             COALESCE(SUM(amount), 0) AS redeemed_value",
            REDEMPTIONS_TABLE,
            EVENT_DATE_COLUMN,
            REDEMPTION_MEASURES,
        ),
        StreamKind::Awards => (
            "COUNT(DISTINCT idmask) AS winners",
            AWARDS_TABLE,
            EVENT_DATE_COLUMN,
            AWARD_MEASURES,
        ),
        StreamKind::Tracings => (
            "COUNT(*) AS transactions, COALESCE(SUM(amount), 0) AS tracked_value",
            TRACINGS_TABLE,
            EVENT_DATE_COLUMN,
            TRACING_MEASURES,
        ),
    };

    let template = format!(
        "SELECT {} AS period, {} FROM {{db}}.{} GROUP BY period",
        grain.bucket_sql(date_column),
        select,
        table
    );
    PeriodStream {
        kind,
        fragment: Fragment::new(template, table).dated(date_column),
        measures,
    }
}

/// Campaign-level targets; never filtered.
pub fn campaign_goal() -> Fragment {
    Fragment::new(
        "SELECT COUNT(*) AS target_users, COALESCE(SUM(goal_amount), 0) AS target_value \
         FROM {db}.mc_users",
        USERS_TABLE,
    )
}

pub fn top_ips(limit: usize) -> Fragment {
    Fragment::new(
        format!(
            "SELECT ip, COUNT(*) AS logins, COUNT(DISTINCT idmask) AS unique_users, \
             MIN(date) AS first_seen, MAX(date) AS last_seen \
             FROM {{db}}.mc_logins WHERE ip IS NOT NULL AND ip <> '' \
             GROUP BY ip ORDER BY logins DESC LIMIT {}",
            limit
        ),
        LOGINS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn logins_by_ip() -> Fragment {
    Fragment::new(
        "SELECT ip, COUNT(*) AS logins, COUNT(DISTINCT idmask) AS unique_users, \
         MIN(date) AS first_seen, MAX(date) AS last_seen \
         FROM {db}.mc_logins WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip",
        LOGINS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn ip_idmask_detail(limit: usize) -> Fragment {
    Fragment::new(
        format!(
            "SELECT ip, idmask, COUNT(*) AS logins, \
             MIN(date) AS first_seen, MAX(date) AS last_seen \
             FROM {{db}}.mc_logins WHERE ip IS NOT NULL AND ip <> '' \
             GROUP BY ip, idmask ORDER BY logins DESC LIMIT {}",
            limit
        ),
        LOGINS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn redemptions_by_ip() -> Fragment {
    Fragment::new(
        "SELECT ip, COUNT(*) AS redemptions, COUNT(DISTINCT idmask) AS redeemers, \
         COUNT(DISTINCT DATE(date)) AS active_days, \
         MIN(date) AS first_seen, MAX(date) AS last_seen \
         FROM {db}.mc_redemptions WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip",
        REDEMPTIONS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn redemptions_by_ip_idmask() -> Fragment {
    Fragment::new(
        "SELECT ip, idmask, COUNT(*) AS redemptions \
         FROM {db}.mc_redemptions WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip, idmask",
        REDEMPTIONS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn amount_distribution() -> Fragment {
    Fragment::new(
        "SELECT amount, COUNT(*) AS redemptions, COALESCE(SUM(amount), 0) AS redeemed_value \
         FROM {db}.mc_redemptions GROUP BY amount ORDER BY amount",
        REDEMPTIONS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn merchant_breakdown() -> Fragment {
    Fragment::new(
        "SELECT merchant, COUNT(*) AS redemptions, COALESCE(SUM(amount), 0) AS redeemed_value \
         FROM {db}.mc_redemptions GROUP BY merchant ORDER BY redemptions DESC",
        REDEMPTIONS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

pub fn merchant_amount_matrix() -> Fragment {
    Fragment::new(
        "SELECT merchant, amount, COUNT(*) AS redemptions \
         FROM {db}.mc_redemptions GROUP BY merchant, amount",
        REDEMPTIONS_TABLE,
    )
    .dated(EVENT_DATE_COLUMN)
}

/// Per `(week, segment, idmask)` two-factor flag, counting only auths made by the
/// end of that week; rolled up by the adoption engine.
pub fn two_factor_base() -> Fragment {
    let week = PeriodGrain::Week.bucket_sql("l.date");
    Fragment::new(
        format!(
            "SELECT {} AS week_start, COALESCE(u.segment, 'unassigned') AS segment, l.idmask, \
             MAX(CASE WHEN t.id IS NULL THEN 0 ELSE 1 END) AS has_two_factor \
             FROM {{db}}.mc_logins l \
             LEFT JOIN {{db}}.mc_users u ON u.idmask = l.idmask \
             LEFT JOIN {{db}}.mc_two_step_auths t ON t.idmask = l.idmask \
             AND t.date < DATE_ADD({}, INTERVAL 7 DAY) \
             GROUP BY week_start, segment, l.idmask",
            week, week
        ),
        LOGINS_TABLE,
    )
    .dated("l.date")
}
