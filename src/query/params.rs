//! Positional parameters, date ranges and composed statements.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positional placeholder bound by the gateway.
pub const PARAM_MARKER: &str = "%s";

/// Scalar value sent to the gateway alongside the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Int(v) => write!(f, "{}", v),
            SqlParam::Float(v) => write!(f, "{}", v),
            SqlParam::Text(v) => write!(f, "'{}'", v),
        }
    }
}

/// Inclusive day range. Always satisfies `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Parse request bounds. Missing, malformed or inverted bounds mean "no range".
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Option<Self> {
        let from = parse_day(from?)?;
        let to = parse_day(to?)?;
        Self::new(from, to)
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Start-of-day / end-of-day bounds as gateway parameters.
    pub fn bounds(&self) -> [SqlParam; 2] {
        [
            SqlParam::Text(format!("{} 00:00:00", self.from.format("%Y-%m-%d"))),
            SqlParam::Text(format!("{} 23:59:59", self.to.format("%Y-%m-%d"))),
        ]
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // chrono accepts unpadded fields; the API contract is strictly YYYY-MM-DD
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Executable statement plus its ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl ComposedQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self { sql: sql.into(), params }
    }
}
