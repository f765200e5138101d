//! Configuration
//!
//! Values come from the environment (a `.env` file is honoured). Analysis
//! tuning lives in an optional JSON settings file; anything it omits keeps
//! its default.

use crate::aggregate::ScoreWeights;
use crate::catalog::CampaignCatalog;
use crate::error::{InsightsError, Result};
use crate::heuristics::{AdoptionSettings, AnomalyThresholds, BreakdownSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const GATEWAY_URL_VAR: &str = "INSIGHTS_GATEWAY_URL";
pub const GATEWAY_TOKEN_VAR: &str = "INSIGHTS_GATEWAY_TOKEN";
pub const GATEWAY_TIMEOUT_VAR: &str = "INSIGHTS_GATEWAY_TIMEOUT_SECS";
pub const CATALOG_PATH_VAR: &str = "INSIGHTS_CATALOG_PATH";
pub const SETTINGS_PATH_VAR: &str = "INSIGHTS_SETTINGS_PATH";

const DEFAULT_GATEWAY_URL: &str = "http://localhost:8090";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env_value(GATEWAY_URL_VAR).unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let token = env_value(GATEWAY_TOKEN_VAR);
        let timeout_secs = match env_value(GATEWAY_TIMEOUT_VAR) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                InsightsError::Configuration(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    GATEWAY_TIMEOUT_VAR, raw
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            base_url,
            token,
            timeout_secs,
        })
    }
}

/// Tuning shared by the analytic views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub anomaly: AnomalyThresholds,
    pub score_weights: ScoreWeights,
    pub adoption: AdoptionSettings,
    pub breakdown: BreakdownSettings,
    pub moving_average_window: usize,
    pub top_ip_limit: usize,
    pub ip_detail_limit: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            anomaly: AnomalyThresholds::default(),
            score_weights: ScoreWeights::default(),
            adoption: AdoptionSettings::default(),
            breakdown: BreakdownSettings::default(),
            moving_average_window: 7,
            top_ip_limit: 20,
            ip_detail_limit: 100,
        }
    }
}

impl AnalysisSettings {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Clone)]
pub struct InsightsConfig {
    pub gateway: GatewayConfig,
    pub catalog_path: Option<PathBuf>,
    pub settings: AnalysisSettings,
}

impl InsightsConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let settings = match env_value(SETTINGS_PATH_VAR) {
            Some(path) => AnalysisSettings::from_json_file(path)?,
            None => AnalysisSettings::default(),
        };
        Ok(Self {
            gateway: GatewayConfig::from_env()?,
            catalog_path: env_value(CATALOG_PATH_VAR).map(PathBuf::from),
            settings,
        })
    }

    pub fn load_catalog(&self) -> Result<CampaignCatalog> {
        let path = self.catalog_path.as_ref().ok_or_else(|| {
            InsightsError::Configuration(format!(
                "no campaign catalog configured; set {} or pass --catalog",
                CATALOG_PATH_VAR
            ))
        })?;
        CampaignCatalog::from_json_file(path)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
