//! Query Composer - turns catalog templates into executable statements
//!
//! Templates reference the campaign schema through a `{db}` placeholder.
//! Composition never touches the stored template: every request parses a
//! fresh [`QueryFragment`], appends its predicates and substitutes the
//! schema name last.

use crate::error::{InsightsError, Result};
use crate::query::fragment::{scan_top_level, strip_statement, Clause, QueryFragment};
use crate::query::params::{ComposedQuery, DateRange, PARAM_MARKER};
use lazy_static::lazy_static;
use regex::Regex;

/// Schema placeholder used by every catalog template.
pub const DB_PLACEHOLDER: &str = "{db}";

lazy_static! {
    static ref BASE_TABLE_RE: Regex = Regex::new(r"\{db\}\.([A-Za-z_][A-Za-z0-9_]*)")
        .expect("base table pattern is valid");
}

const RESERVED_WORDS: &[&str] = &[
    "WHERE", "JOIN", "ON", "LEFT", "RIGHT", "INNER", "OUTER", "CROSS", "FULL", "NATURAL",
    "STRAIGHT_JOIN", "GROUP", "ORDER", "LIMIT", "HAVING", "UNION", "USING", "SET", "AND",
    "OR", "AS", "WINDOW", "FOR", "LOCK",
];

/// A template together with the metadata needed to filter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentSpec<'a> {
    pub template: &'a str,
    /// Table the fragment aggregates over; inferred from the template when absent.
    pub base_table: Option<&'a str>,
    /// Column (alias-qualified as written in the template) the date range applies to.
    pub date_column: Option<&'a str>,
}

impl<'a> FragmentSpec<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            base_table: None,
            date_column: None,
        }
    }

    pub fn with_base_table(mut self, table: &'a str) -> Self {
        self.base_table = Some(table);
        self
    }

    pub fn with_date_column(mut self, column: &'a str) -> Self {
        self.date_column = Some(column);
        self
    }

    /// Explicit base table, falling back to the first `{db}.<table>` reference.
    pub fn resolved_base_table(&self) -> Option<String> {
        self.base_table
            .map(str::to_string)
            .or_else(|| infer_base_table(self.template))
    }
}

/// Replace every `{db}` occurrence with the campaign schema.
pub fn substitute_database(template: &str, database: &str) -> Result<String> {
    if !template.contains(DB_PLACEHOLDER) {
        return Err(InsightsError::Configuration(format!(
            "template has no {} placeholder: {}",
            DB_PLACEHOLDER,
            preview(template)
        )));
    }
    if database.trim().is_empty() {
        return Err(InsightsError::Configuration(
            "campaign database name is empty".to_string(),
        ));
    }
    Ok(template.replace(DB_PLACEHOLDER, database))
}

/// Add `<column> BETWEEN %s AND %s` when a range is present.
///
/// The statement is rebuilt with exactly one trailing semicolon. Without a
/// range the statement is only normalized and no parameters are returned.
pub fn append_date_filter(
    sql: &str,
    date_column: &str,
    range: Option<&DateRange>,
) -> ComposedQuery {
    let mut fragment = QueryFragment::parse(sql);
    if let Some(range) = range {
        push_date_predicate(&mut fragment, date_column, range);
    }
    fragment.to_statement()
}

pub(crate) fn push_date_predicate(fragment: &mut QueryFragment, column: &str, range: &DateRange) {
    fragment.push_predicate(
        format!("{} BETWEEN {} AND {}", column, PARAM_MARKER, PARAM_MARKER),
        range.bounds().to_vec(),
    );
}

/// Statement split into everything before the trailing ORDER BY / LIMIT and that tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTail {
    pub core: String,
    /// Empty when the statement has neither clause.
    pub tail: String,
}

/// Split off a trailing `ORDER BY ...` and/or `LIMIT ...`.
///
/// LIMIT is located first since it may follow ORDER BY; an ORDER BY is only
/// part of the tail when it precedes the LIMIT.
pub fn extract_query_tail(sql: &str) -> QueryTail {
    let sql = strip_statement(sql);
    let marks = scan_top_level(sql);

    let limit_start = marks
        .iter()
        .rev()
        .find(|m| m.clause == Clause::Limit)
        .map(|m| m.start);
    let order_limit = limit_start.unwrap_or(sql.len());
    let order_start = marks
        .iter()
        .rev()
        .find(|m| m.clause == Clause::OrderBy && m.start < order_limit)
        .map(|m| m.start);

    match order_start.or(limit_start) {
        Some(start) => QueryTail {
            core: sql[..start].trim_end().to_string(),
            tail: sql[start..].trim().to_string(),
        },
        None => QueryTail {
            core: sql.to_string(),
            tail: String::new(),
        },
    }
}

/// Alias bound to `{db}.<table>` in the template, if any.
pub fn detect_table_alias(sql: &str, table: &str) -> Option<String> {
    let pattern = format!(
        r"(?i)\{{db\}}\.{}\s+(?:AS\s+)?([A-Za-z_][A-Za-z0-9_]*)",
        regex::escape(table)
    );
    let re = Regex::new(&pattern).ok()?;
    let alias = re.captures(sql)?.get(1)?.as_str();
    if RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(alias)) {
        return None;
    }
    Some(alias.to_string())
}

/// First `{db}.<identifier>` referenced by the template.
pub fn infer_base_table(sql: &str) -> Option<String> {
    BASE_TABLE_RE
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// `alias.column` when the table is aliased, bare `column` otherwise.
pub fn column_ref(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{}.{}", alias, column),
        None => column.to_string(),
    }
}

fn preview(template: &str) -> String {
    let flat: String = template.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 80 {
        format!("{}...", flat.chars().take(80).collect::<String>())
    } else {
        flat
    }
}
