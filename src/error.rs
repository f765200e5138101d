use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    /// Malformed catalog template or configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Campaign selection falls outside the caller's allowed set.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Gateway call failed or returned a non-ok status.
    #[error("Upstream query error: {0}")]
    UpstreamQuery(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InsightsError {
    /// HTTP-equivalent status for callers that surface errors over a wire.
    pub fn status_code(&self) -> u16 {
        match self {
            InsightsError::AccessDenied(_) => 403,
            InsightsError::CampaignNotFound(_) => 404,
            InsightsError::UpstreamQuery(_) => 502,
            InsightsError::Configuration(_) | InsightsError::Io(_) | InsightsError::Json(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
