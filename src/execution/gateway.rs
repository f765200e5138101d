//! Execution Gateway contract
//!
//! The gateway is an external service that binds `%s` placeholders and runs a
//! statement against one campaign schema. Implementations must be shareable
//! across concurrently running fragments.

use crate::error::{InsightsError, Result};
use crate::query::{ComposedQuery, SqlParam, DB_PLACEHOLDER};
use crate::rows::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub database: String,
    pub sql: String,
    pub parameters: Vec<SqlParam>,
}

impl GatewayRequest {
    /// Request for a composed statement; rejects unresolved `{db}` tokens.
    pub fn new(database: &str, query: ComposedQuery) -> Result<Self> {
        if query.sql.contains(DB_PLACEHOLDER) {
            return Err(InsightsError::Configuration(format!(
                "statement still contains {} placeholder",
                DB_PLACEHOLDER
            )));
        }
        Ok(Self {
            database: database.to_string(),
            sql: query.sql,
            parameters: query.params,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl GatewayResponse {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len(),
            rows,
        }
    }
}

#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Run one statement. Transport errors and non-ok statuses are `UpstreamQuery`.
    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse>;
}
