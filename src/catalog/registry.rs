//! Campaign Catalog
//!
//! In-memory registry of campaigns, loaded once at startup and read-only
//! afterwards.

use crate::catalog::campaign::Campaign;
use crate::error::{InsightsError, Result};
use crate::query::{substitute_database, DB_PLACEHOLDER};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    campaigns: Vec<Campaign>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignCatalog {
    campaigns: Vec<Arc<Campaign>>,
    index: HashMap<String, usize>,
}

impl CampaignCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a campaign. Ids must be unique.
    pub fn register(&mut self, campaign: Campaign) -> Result<()> {
        validate(&campaign)?;
        if self.index.contains_key(&campaign.id) {
            return Err(InsightsError::Configuration(format!(
                "duplicate campaign id '{}'",
                campaign.id
            )));
        }
        self.index.insert(campaign.id.clone(), self.campaigns.len());
        self.campaigns.push(Arc::new(campaign));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<Campaign>> {
        self.index
            .get(id.trim())
            .map(|idx| Arc::clone(&self.campaigns[*idx]))
    }

    /// Campaigns in registration order.
    pub fn list(&self) -> &[Arc<Campaign>] {
        &self.campaigns
    }

    pub fn ids(&self) -> Vec<String> {
        self.campaigns.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    /// `{"campaigns": [...]}`; campaigns without metrics, charts or sample
    /// inherit the standard set.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for campaign in file.campaigns {
            catalog.register(campaign.with_standard_defaults())?;
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        info!("Loaded {} campaigns from {}", catalog.len(), path.display());
        Ok(catalog)
    }
}

fn validate(campaign: &Campaign) -> Result<()> {
    if campaign.id.trim().is_empty() {
        return Err(InsightsError::Configuration(
            "campaign id must not be empty".to_string(),
        ));
    }
    if campaign.database.trim().is_empty() {
        return Err(InsightsError::Configuration(format!(
            "campaign '{}' has no database",
            campaign.id
        )));
    }

    let templates = campaign
        .metrics
        .iter()
        .map(|m| (m.key.as_str(), m.sql_template.as_str()))
        .chain(
            campaign
                .charts
                .iter()
                .map(|c| (c.key.as_str(), c.sql_template.as_str())),
        )
        .chain(campaign.sample_query.as_deref().map(|sql| ("sample", sql)));

    for (key, template) in templates {
        substitute_database(template, &campaign.database).map_err(|_| {
            InsightsError::Configuration(format!(
                "campaign '{}' fragment '{}' does not reference {}",
                campaign.id, key, DB_PLACEHOLDER
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::campaign::MetricDefinition;

    #[test]
    fn test_register_and_get() {
        let mut catalog = CampaignCatalog::new();
        catalog
            .register(Campaign::new("spring", "Spring Rewards", "mc_spring"))
            .unwrap();
        catalog
            .register(Campaign::new("summer", "Summer Cashback", "mc_summer"))
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("summer").unwrap().database, "mc_summer");
        assert!(catalog.get("autumn").is_none());
        assert_eq!(catalog.ids(), vec!["spring", "summer"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut catalog = CampaignCatalog::new();
        catalog.register(Campaign::new("a", "A", "db_a")).unwrap();
        let err = catalog.register(Campaign::new("a", "A2", "db_b")).unwrap_err();
        assert!(matches!(err, InsightsError::Configuration(_)));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut campaign = Campaign::new("a", "A", "db_a");
        campaign
            .metrics
            .push(MetricDefinition::new("bad", "Bad", "SELECT COUNT(*) FROM mc_users"));
        let err = CampaignCatalog::new().register(campaign).unwrap_err();
        assert!(err.to_string().contains("'bad'"));
    }

    #[test]
    fn test_from_json_inherits_standard_fragments() {
        let json = r#"{
            "campaigns": [
                {"id": "spring", "name": "Spring Rewards", "database": "mc_spring"},
                {
                    "id": "vip",
                    "name": "VIP",
                    "database": "mc_vip",
                    "description": "Invite only",
                    "metrics": [
                        {"key": "vip_logins", "label": "VIP logins",
                         "sqlTemplate": "SELECT COUNT(*) AS value FROM {db}.mc_logins",
                         "dateColumn": "date", "baseTable": "mc_logins"}
                    ]
                }
            ]
        }"#;
        let catalog = CampaignCatalog::from_json_str(json).unwrap();
        let spring = catalog.get("spring").unwrap();
        assert!(spring.metric("total_logins").is_some());
        assert!(spring.sample_query.is_some());

        let vip = catalog.get("vip").unwrap();
        assert_eq!(vip.metrics.len(), 1);
        assert_eq!(vip.metrics[0].date_column.as_deref(), Some("date"));
        assert!(vip.chart("logins_by_type").is_some());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(matches!(
            CampaignCatalog::from_json_str("{\"campaigns\": 3}"),
            Err(InsightsError::Json(_))
        ));
    }
}
