//! Gateway rows and the field names shared with the catalog templates
//!
//! The gateway returns string-keyed records whose numeric columns may come
//! back as JSON numbers, decimal strings or nulls depending on the driver.
//! Consumers read rows through [`RowExt`] using the constants in [`fields`],
//! which are the aliases the fragment templates select.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

pub type Row = serde_json::Map<String, Value>;

pub mod fields {
    pub const VALUE: &str = "value";
    pub const LABEL: &str = "label";
    pub const PERIOD: &str = "period";

    pub const REGISTRATIONS: &str = "registrations";
    pub const LOGINS: &str = "logins";
    pub const LOGIN_USERS: &str = "login_users";
    pub const REDEMPTIONS: &str = "redemptions";
    pub const REDEEMERS: &str = "redeemers";
    pub const REDEEMED_VALUE: &str = "redeemed_value";
    pub const WINNERS: &str = "winners";
    pub const TRANSACTIONS: &str = "transactions";
    pub const TRACKED_VALUE: &str = "tracked_value";

    pub const TARGET_USERS: &str = "target_users";
    pub const TARGET_VALUE: &str = "target_value";

    pub const IP: &str = "ip";
    pub const IDMASK: &str = "idmask";
    pub const UNIQUE_USERS: &str = "unique_users";
    pub const FIRST_SEEN: &str = "first_seen";
    pub const LAST_SEEN: &str = "last_seen";
    pub const ACTIVE_DAYS: &str = "active_days";

    pub const MERCHANT: &str = "merchant";
    pub const AMOUNT: &str = "amount";

    pub const WEEK_START: &str = "week_start";
    pub const SEGMENT: &str = "segment";
    pub const USERS_WITH_TWO_FACTOR: &str = "users_with_two_factor";
    pub const TOTAL_USERS: &str = "total_users";
}

pub trait RowExt {
    /// Numeric value; accepts numbers, numeric strings and booleans.
    fn opt_number(&self, field: &str) -> Option<f64>;

    /// Numeric value with missing or non-numeric cells read as 0.
    fn number(&self, field: &str) -> f64 {
        self.opt_number(field).unwrap_or(0.0)
    }

    /// Non-negative whole count.
    fn count(&self, field: &str) -> u64 {
        let value = self.number(field);
        if value.is_finite() && value > 0.0 {
            value.round() as u64
        } else {
            0
        }
    }

    /// Text value; numbers are rendered, nulls are absent.
    fn text(&self, field: &str) -> Option<String>;

    fn timestamp(&self, field: &str) -> Option<NaiveDateTime> {
        self.text(field).and_then(|raw| parse_timestamp(&raw))
    }
}

impl RowExt for Row {
    fn opt_number(&self, field: &str) -> Option<f64> {
        value_as_number(self.get(field)?)
    }

    fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

pub fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// `value` column of the first row, else its first column in select order.
pub fn scalar(rows: &[Row]) -> Option<f64> {
    let row = rows.first()?;
    if let Some(value) = row.opt_number(fields::VALUE) {
        return Some(value);
    }
    row.values().next().and_then(value_as_number)
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.fff]` and the `T`-separated form.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.fZ"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_number_normalization() {
        let r = row(json!({"a": 3, "b": "12.50", "c": null, "d": "n/a", "e": true}));
        assert_eq!(r.number("a"), 3.0);
        assert_eq!(r.number("b"), 12.5);
        assert_eq!(r.number("c"), 0.0);
        assert_eq!(r.number("d"), 0.0);
        assert_eq!(r.number("e"), 1.0);
        assert_eq!(r.number("missing"), 0.0);
        assert_eq!(r.count("b"), 13);
        assert_eq!(r.opt_number("c"), None);
    }

    #[test]
    fn test_text_and_timestamps() {
        let r = row(json!({
            "ip": "10.0.0.1",
            "amount": 50,
            "first_seen": "2024-03-04 10:15:00",
            "last_seen": "2024-03-05T08:00:00",
            "day": "2024-03-06",
        }));
        assert_eq!(r.text("ip").as_deref(), Some("10.0.0.1"));
        assert_eq!(r.text("amount").as_deref(), Some("50"));
        assert!(r.timestamp("first_seen").is_some());
        assert!(r.timestamp("last_seen").is_some());
        assert_eq!(
            r.timestamp("day"),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_scalar() {
        assert_eq!(scalar(&[row(json!({"value": "42"}))]), Some(42.0));
        assert_eq!(scalar(&[row(json!({"COUNT(*)": 7}))]), Some(7.0));
        assert_eq!(scalar(&[]), None);
    }

    #[test]
    fn test_scalar_reads_first_selected_column() {
        let body: Row = serde_json::from_str(r#"{"total": 500, "a_count": 3}"#).unwrap();
        assert_eq!(scalar(&[body]), Some(500.0));

        let labelled: Row = serde_json::from_str(r#"{"label": "gold", "n": 4}"#).unwrap();
        assert_eq!(scalar(&[labelled]), None);
    }
}
