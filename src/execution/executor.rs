//! Query fan-out over a shared gateway

use crate::error::{InsightsError, Result};
use crate::execution::gateway::{GatewayRequest, QueryGateway};
use crate::query::ComposedQuery;
use crate::rows::Row;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

#[derive(Clone)]
pub struct QueryExecutor {
    gateway: Arc<dyn QueryGateway>,
}

impl QueryExecutor {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &dyn QueryGateway {
        self.gateway.as_ref()
    }

    /// Run one composed statement against `database`.
    pub async fn run(&self, database: &str, query: ComposedQuery) -> Result<Vec<Row>> {
        let request = GatewayRequest::new(database, query)?;
        Ok(self.gateway.execute(request).await?.rows)
    }

    /// Run statements concurrently; results keep the input order and fail independently.
    pub async fn run_all(
        &self,
        database: &str,
        queries: Vec<ComposedQuery>,
    ) -> Vec<Result<Vec<Row>>> {
        let total = queries.len();
        let mut tasks = JoinSet::new();
        for (idx, query) in queries.into_iter().enumerate() {
            let executor = self.clone();
            let database = database.to_string();
            tasks.spawn(async move { (idx, executor.run(&database, query).await) });
        }

        let mut results: Vec<Option<Result<Vec<Row>>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!("Query task aborted: {}", e),
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(InsightsError::UpstreamQuery("query task aborted".to_string()))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::scripted::ScriptedGateway;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_all_keeps_order_and_isolates_failures() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .on("mc_users", vec![json!({"value": 10})])
                .on("mc_logins", vec![json!({"value": 20})])
                .fail_on("mc_tracings"),
        );
        let executor = QueryExecutor::new(gateway.clone());
        let results = executor
            .run_all(
                "camp",
                vec![
                    ComposedQuery::new("SELECT COUNT(*) AS value FROM camp.mc_logins;", vec![]),
                    ComposedQuery::new("SELECT COUNT(*) AS value FROM camp.mc_tracings;", vec![]),
                    ComposedQuery::new("SELECT COUNT(*) AS value FROM camp.mc_users;", vec![]),
                ],
            )
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap()[0]["value"], json!(20));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap()[0]["value"], json!(10));
        assert_eq!(gateway.request_count(), 3);
    }

    #[tokio::test]
    async fn test_run_rejects_unresolved_template() {
        let executor = QueryExecutor::new(Arc::new(ScriptedGateway::new()));
        let result = executor
            .run("camp", ComposedQuery::new("SELECT 1 FROM {db}.mc_users;", vec![]))
            .await;
        assert!(matches!(result, Err(InsightsError::Configuration(_))));
    }
}
