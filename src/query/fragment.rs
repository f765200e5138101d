//! Query Fragment - clause-level view of a catalog SQL template
//!
//! Templates are hand-authored SQL. Instead of splicing text around whatever
//! `WHERE`/`ORDER BY`/`LIMIT` happens to be present, a template is split once
//! into its top-level clauses and extra predicates are appended to a list.
//! Keywords nested inside parentheses (subqueries, window specs, function
//! calls) or quoted literals never count as clause boundaries.

use crate::query::params::{ComposedQuery, SqlParam};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
}

impl Clause {
    fn keyword(&self) -> &'static str {
        match self {
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            Clause::OrderBy => "ORDER BY",
            Clause::Limit => "LIMIT",
        }
    }
}

/// Position of a top-level clause keyword in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClauseMark {
    pub clause: Clause,
    /// Byte offset of the keyword.
    pub start: usize,
    /// Byte offset just past the keyword.
    pub end: usize,
}

/// Predicate appended to the WHERE clause, with the parameters its placeholders bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// A statement split into its top-level clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFragment {
    /// SELECT list, FROM and JOINs.
    head: String,
    where_body: Option<String>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<String>,
    predicates: Vec<Predicate>,
}

impl QueryFragment {
    /// Split a statement. Trailing semicolons are dropped.
    pub fn parse(sql: &str) -> Self {
        let sql = strip_statement(sql);
        let marks = first_occurrences(scan_top_level(sql));

        let head_end = marks.first().map(|m| m.start).unwrap_or(sql.len());
        let mut fragment = Self {
            head: sql[..head_end].trim().to_string(),
            where_body: None,
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            predicates: Vec::new(),
        };

        for (idx, mark) in marks.iter().enumerate() {
            let body_end = marks.get(idx + 1).map(|m| m.start).unwrap_or(sql.len());
            let body = sql[mark.end..body_end].trim();
            if body.is_empty() {
                continue;
            }
            let slot = match mark.clause {
                Clause::Where => &mut fragment.where_body,
                Clause::GroupBy => &mut fragment.group_by,
                Clause::Having => &mut fragment.having,
                Clause::OrderBy => &mut fragment.order_by,
                Clause::Limit => &mut fragment.limit,
            };
            *slot = Some(body.to_string());
        }

        fragment
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    /// True when the statement (as parsed or after injection) filters rows.
    pub fn has_where(&self) -> bool {
        self.where_body.is_some() || !self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn push_predicate(&mut self, sql: impl Into<String>, params: Vec<SqlParam>) {
        self.predicates.push(Predicate {
            sql: sql.into(),
            params,
        });
    }

    /// Rendered WHERE body. An original body is parenthesized once anything is
    /// appended so that an `OR` in it cannot absorb the injected terms.
    pub fn where_clause(&self) -> Option<String> {
        let injected = self
            .predicates
            .iter()
            .map(|p| p.sql.as_str())
            .join(" AND ");

        match (&self.where_body, injected.is_empty()) {
            (None, true) => None,
            (Some(body), true) => Some(body.clone()),
            (None, false) => Some(injected),
            (Some(body), false) => Some(format!("({}) AND {}", body, injected)),
        }
    }

    /// `ORDER BY ...` and/or `LIMIT ...`, empty when neither is present.
    pub fn tail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(order_by) = &self.order_by {
            parts.push(format!("{} {}", Clause::OrderBy.keyword(), order_by));
        }
        if let Some(limit) = &self.limit {
            parts.push(format!("{} {}", Clause::Limit.keyword(), limit));
        }
        parts.join(" ")
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> Vec<SqlParam> {
        self.predicates
            .iter()
            .flat_map(|p| p.params.iter().cloned())
            .collect()
    }

    /// Statement text without a terminating semicolon, suitable for embedding.
    pub fn render(&self) -> String {
        let mut parts = vec![self.head.clone()];
        if let Some(where_clause) = self.where_clause() {
            parts.push(format!("{} {}", Clause::Where.keyword(), where_clause));
        }
        if let Some(group_by) = &self.group_by {
            parts.push(format!("{} {}", Clause::GroupBy.keyword(), group_by));
        }
        if let Some(having) = &self.having {
            parts.push(format!("{} {}", Clause::Having.keyword(), having));
        }
        let tail = self.tail();
        if !tail.is_empty() {
            parts.push(tail);
        }
        parts.join(" ")
    }

    /// Embeddable query (no semicolon) with its parameters.
    pub fn to_query(&self) -> ComposedQuery {
        ComposedQuery::new(self.render(), self.params())
    }

    /// Complete statement terminated by exactly one semicolon.
    pub fn to_statement(&self) -> ComposedQuery {
        ComposedQuery::new(format!("{};", self.render()), self.params())
    }
}

/// Trim whitespace and any number of trailing semicolons.
pub(crate) fn strip_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword_at(bytes: &[u8], at: usize, keyword: &str) -> Option<usize> {
    let kw = keyword.as_bytes();
    let end = at + kw.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(kw) {
        return None;
    }
    if bytes.get(end).map(|b| is_ident_byte(*b)).unwrap_or(false) {
        return None;
    }
    Some(end)
}

fn two_word_keyword_at(bytes: &[u8], at: usize, first: &str, second: &str) -> Option<usize> {
    let first_bytes = first.as_bytes();
    let first_end = at + first_bytes.len();
    if first_end > bytes.len() || !bytes[at..first_end].eq_ignore_ascii_case(first_bytes) {
        return None;
    }
    let mut cursor = first_end;
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if cursor == first_end {
        return None;
    }
    keyword_at(bytes, cursor, second)
}

fn clause_at(bytes: &[u8], at: usize) -> Option<(Clause, usize)> {
    match bytes[at].to_ascii_uppercase() {
        b'W' => keyword_at(bytes, at, "WHERE").map(|end| (Clause::Where, end)),
        b'G' => two_word_keyword_at(bytes, at, "GROUP", "BY").map(|end| (Clause::GroupBy, end)),
        b'H' => keyword_at(bytes, at, "HAVING").map(|end| (Clause::Having, end)),
        b'O' => two_word_keyword_at(bytes, at, "ORDER", "BY").map(|end| (Clause::OrderBy, end)),
        b'L' => keyword_at(bytes, at, "LIMIT").map(|end| (Clause::Limit, end)),
        _ => None,
    }
}

/// Every clause keyword at parenthesis depth zero, outside quotes, in order.
pub(crate) fn scan_top_level(sql: &str) -> Vec<ClauseMark> {
    let bytes = sql.as_bytes();
    let mut marks = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                // doubled quote is an escaped quote
                if bytes.get(i + 1) == Some(&q) {
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 => {
                let word_start = i == 0 || !(is_ident_byte(bytes[i - 1]) || bytes[i - 1] == b'.');
                if word_start {
                    if let Some((clause, end)) = clause_at(bytes, i) {
                        marks.push(ClauseMark { clause, start: i, end });
                        i = end;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    marks
}

/// Keep the first mark of each clause kind; repeats stay part of the earlier body.
fn first_occurrences(marks: Vec<ClauseMark>) -> Vec<ClauseMark> {
    let mut kept: Vec<ClauseMark> = Vec::new();
    for mark in marks {
        if !kept.iter().any(|k| k.clause == mark.clause) {
            kept.push(mark);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_statement() {
        let fragment = QueryFragment::parse(
            "SELECT l.ip, COUNT(*) AS logins FROM {db}.mc_logins l WHERE l.ip IS NOT NULL \
             GROUP BY l.ip HAVING COUNT(*) > 1 ORDER BY logins DESC LIMIT 20;",
        );
        assert_eq!(fragment.head(), "SELECT l.ip, COUNT(*) AS logins FROM {db}.mc_logins l");
        assert_eq!(fragment.where_clause().as_deref(), Some("l.ip IS NOT NULL"));
        assert_eq!(fragment.tail(), "ORDER BY logins DESC LIMIT 20");
        assert_eq!(
            fragment.render(),
            "SELECT l.ip, COUNT(*) AS logins FROM {db}.mc_logins l WHERE l.ip IS NOT NULL \
             GROUP BY l.ip HAVING COUNT(*) > 1 ORDER BY logins DESC LIMIT 20"
        );
    }

    #[test]
    fn test_nested_keywords_are_ignored() {
        let sql = "SELECT idmask, ROW_NUMBER() OVER (ORDER BY date) AS rn \
                   FROM {db}.mc_logins WHERE idmask IN (SELECT idmask FROM {db}.mc_users WHERE segment = 'a') \
                   LIMIT 5";
        let marks = scan_top_level(sql);
        let clauses: Vec<Clause> = marks.iter().map(|m| m.clause).collect();
        assert_eq!(clauses, vec![Clause::Where, Clause::Limit]);
    }

    #[test]
    fn test_quoted_keywords_are_ignored() {
        let fragment =
            QueryFragment::parse("SELECT 'where' AS w, \"order by\" AS o FROM {db}.mc_users u");
        assert!(!fragment.has_where());
        assert_eq!(fragment.tail(), "");
    }

    #[test]
    fn test_identifiers_containing_keywords() {
        let fragment = QueryFragment::parse(
            "SELECT t.limit_value, orderby_col FROM {db}.mc_tracings t WHERE t.where_flag = 1",
        );
        assert_eq!(fragment.where_clause().as_deref(), Some("t.where_flag = 1"));
        assert_eq!(fragment.tail(), "");
    }

    #[test]
    fn test_predicates_bind_tighter_than_existing_or() {
        let mut fragment = QueryFragment::parse("SELECT * FROM {db}.mc_logins WHERE a = 1 OR b = 2");
        fragment.push_predicate("idmask = %s", vec![SqlParam::from("u1")]);
        assert_eq!(
            fragment.render(),
            "SELECT * FROM {db}.mc_logins WHERE (a = 1 OR b = 2) AND idmask = %s"
        );
        assert_eq!(fragment.params(), vec![SqlParam::from("u1")]);
    }

    #[test]
    fn test_predicates_land_before_group_by_and_tail() {
        let mut fragment = QueryFragment::parse(
            "SELECT type, COUNT(*) FROM {db}.mc_logins GROUP BY type ORDER BY 2 DESC LIMIT 3",
        );
        fragment.push_predicate("idmask = %s", vec![SqlParam::from("u1")]);
        fragment.push_predicate("ip = %s", vec![SqlParam::from("10.0.0.1")]);
        assert_eq!(
            fragment.render(),
            "SELECT type, COUNT(*) FROM {db}.mc_logins WHERE idmask = %s AND ip = %s \
             GROUP BY type ORDER BY 2 DESC LIMIT 3"
        );
    }

    #[test]
    fn test_statement_has_single_semicolon() {
        let fragment = QueryFragment::parse("SELECT 1 FROM {db}.mc_users;;  ");
        assert_eq!(fragment.to_statement().sql, "SELECT 1 FROM {db}.mc_users;");
        assert_eq!(fragment.to_query().sql, "SELECT 1 FROM {db}.mc_users");
    }

    #[test]
    fn test_lowercase_and_multiline_keywords() {
        let fragment = QueryFragment::parse(
            "select count(*)\nfrom {db}.mc_redemptions r\nwhere r.amount > 0\norder\n  by r.date",
        );
        assert_eq!(fragment.where_clause().as_deref(), Some("r.amount > 0"));
        assert_eq!(fragment.tail(), "ORDER BY r.date");
    }
}
