//! HTTP Query Gateway
//!
//! `POST <base>/query` with a JSON [`GatewayRequest`] body. The gateway answers
//! `{rowCount, rows}` and may add `status` / `error` fields on failure.

use crate::config::GatewayConfig;
use crate::error::{InsightsError, Result};
use crate::execution::gateway::{GatewayRequest, GatewayResponse, QueryGateway};
use crate::rows::Row;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryEnvelope {
    #[serde(default)]
    row_count: Option<usize>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpQueryGateway {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl HttpQueryGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                InsightsError::Configuration(format!("Failed to create gateway HTTP client: {}", e))
            })?;

        Ok(Self {
            endpoint: format!("{}/query", config.base_url.trim_end_matches('/')),
            token: config.token.clone(),
            client,
        })
    }

    /// Gateway from `INSIGHTS_GATEWAY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&GatewayConfig::from_env()?)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryGateway for HttpQueryGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        let query_id = Uuid::new_v4();
        let started = Instant::now();
        debug!(
            "[{}] {} on {} with {} parameters",
            query_id,
            request.sql,
            request.database,
            request.parameters.len()
        );

        let mut call = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.token {
            call = call.bearer_auth(token);
        }

        let response = call.send().await.map_err(|e| {
            warn!("[{}] gateway request failed: {}", query_id, e);
            InsightsError::UpstreamQuery(format!("gateway request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("[{}] gateway returned {}", query_id, status);
            return Err(InsightsError::UpstreamQuery(format!(
                "gateway returned status {}: {}",
                status, text
            )));
        }

        let envelope: QueryEnvelope = response.json().await.map_err(|e| {
            InsightsError::UpstreamQuery(format!("failed to parse gateway response: {}", e))
        })?;
        let response = into_response(envelope)?;

        info!(
            "[{}] {} rows from {} in {}ms",
            query_id,
            response.row_count,
            request.database,
            started.elapsed().as_millis()
        );
        Ok(response)
    }
}

fn into_response(envelope: QueryEnvelope) -> Result<GatewayResponse> {
    if let Some(error) = envelope.error.filter(|e| !e.trim().is_empty()) {
        return Err(InsightsError::UpstreamQuery(error));
    }
    if let Some(status) = envelope.status {
        if !status.eq_ignore_ascii_case("ok") {
            return Err(InsightsError::UpstreamQuery(format!(
                "gateway status '{}'",
                status
            )));
        }
    }
    Ok(GatewayResponse {
        row_count: envelope.row_count.unwrap_or(envelope.rows.len()),
        rows: envelope.rows,
    })
}
