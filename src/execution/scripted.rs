//! Scripted gateway for tests and dry runs
//!
//! Answers each request with the rows of the longest matching SQL substring
//! rule. Rules scoped to a database win over unscoped ones. Requests that
//! match nothing return no rows.

use crate::error::{InsightsError, Result};
use crate::execution::gateway::{GatewayRequest, GatewayResponse, QueryGateway};
use crate::rows::Row;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Rule {
    database: Option<String>,
    pattern: String,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct ScriptedGateway {
    rules: Vec<Rule>,
    failing_databases: HashSet<String>,
    failing_patterns: Vec<String>,
    log: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern` with `rows` (JSON objects).
    pub fn on(mut self, pattern: &str, rows: Vec<Value>) -> Self {
        self.rules.push(Rule {
            database: None,
            pattern: pattern.to_string(),
            rows: to_rows(rows),
        });
        self
    }

    /// Like [`ScriptedGateway::on`], only for requests against `database`.
    pub fn on_database(mut self, database: &str, pattern: &str, rows: Vec<Value>) -> Self {
        self.rules.push(Rule {
            database: Some(database.to_string()),
            pattern: pattern.to_string(),
            rows: to_rows(rows),
        });
        self
    }

    /// Every request against `database` fails upstream.
    pub fn fail_database(mut self, database: &str) -> Self {
        self.failing_databases.insert(database.to_string());
        self
    }

    /// Every statement containing `pattern` fails upstream.
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failing_patterns.push(pattern.to_string());
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or_default()
    }

    /// Logged requests whose SQL contains `pattern`.
    pub fn requests_matching(&self, pattern: &str) -> Vec<GatewayRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.sql.contains(pattern))
            .collect()
    }

    fn answer(&self, request: &GatewayRequest) -> Result<Vec<Row>> {
        if self.failing_databases.contains(&request.database) {
            return Err(InsightsError::UpstreamQuery(format!(
                "database {} is unavailable",
                request.database
            )));
        }
        if let Some(pattern) = self
            .failing_patterns
            .iter()
            .find(|p| request.sql.contains(p.as_str()))
        {
            return Err(InsightsError::UpstreamQuery(format!(
                "scripted failure for '{}'",
                pattern
            )));
        }

        let best = self
            .rules
            .iter()
            .filter(|rule| {
                rule.database
                    .as_ref()
                    .map_or(true, |db| db == &request.database)
                    && request.sql.contains(rule.pattern.as_str())
            })
            .max_by_key(|rule| (rule.database.is_some(), rule.pattern.len()));
        Ok(best.map(|rule| rule.rows.clone()).unwrap_or_default())
    }
}

fn to_rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl QueryGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        let answer = self.answer(&request);
        if let Ok(mut log) = self.log.lock() {
            log.push(request);
        }
        answer.map(GatewayResponse::from_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ComposedQuery;
    use serde_json::json;

    fn request(database: &str, sql: &str) -> GatewayRequest {
        GatewayRequest::new(database, ComposedQuery::new(sql, vec![])).unwrap()
    }

    #[tokio::test]
    async fn test_longest_and_scoped_rules_win() {
        let gateway = ScriptedGateway::new()
            .on("FROM", vec![json!({"value": 1})])
            .on("FROM a.mc_logins", vec![json!({"value": 2})])
            .on_database("b", "FROM", vec![json!({"value": 3})]);

        let rows = gateway
            .execute(request("a", "SELECT COUNT(*) AS value FROM a.mc_logins;"))
            .await
            .unwrap()
            .rows;
        assert_eq!(rows[0]["value"], json!(2));

        let rows = gateway
            .execute(request("b", "SELECT COUNT(*) AS value FROM b.mc_logins;"))
            .await
            .unwrap()
            .rows;
        assert_eq!(rows[0]["value"], json!(3));

        let rows = gateway.execute(request("a", "SHOW TABLES;")).await.unwrap().rows;
        assert!(rows.is_empty());
        assert_eq!(gateway.request_count(), 3);
    }

    #[tokio::test]
    async fn test_failures() {
        let gateway = ScriptedGateway::new().fail_database("down").fail_on("mc_tracings");
        assert!(gateway.execute(request("down", "SELECT 1;")).await.is_err());
        assert!(gateway
            .execute(request("up", "SELECT 1 FROM up.mc_tracings;"))
            .await
            .is_err());
        assert!(gateway.execute(request("up", "SELECT 1;")).await.is_ok());
    }
}
