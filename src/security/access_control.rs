//! Access Control
//!
//! Campaign-level authorization. Single-campaign requests outside the
//! caller's allowed set are rejected; multi-campaign selections are narrowed
//! to the allowed subset and rejected only when nothing remains.

use crate::catalog::{Campaign, CampaignCatalog};
use crate::error::{InsightsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identity supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub user_id: String,
    pub allowed_campaign_ids: BTreeSet<String>,
}

impl CallerIdentity {
    pub fn new<I, S>(user_id: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.to_string(),
            allowed_campaign_ids: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, campaign_id: &str) -> bool {
        self.allowed_campaign_ids.contains(campaign_id)
    }
}

/// `campaignId` request parameter: a comma list or `all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignSelection {
    All,
    Ids(Vec<String>),
}

impl CampaignSelection {
    /// Blank input and `all` (any case) select everything; ids are trimmed and deduplicated.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return CampaignSelection::All;
        }
        let mut seen = BTreeSet::new();
        let ids: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
            .map(str::to_string)
            .collect();
        if ids.iter().any(|id| id.eq_ignore_ascii_case("all")) || ids.is_empty() {
            CampaignSelection::All
        } else {
            CampaignSelection::Ids(ids)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CampaignSelection::All)
    }
}

pub struct AccessController {
    identity: CallerIdentity,
}

impl AccessController {
    pub fn new(identity: CallerIdentity) -> Self {
        Self { identity }
    }

    /// One campaign the caller must be allowed to read.
    pub fn authorize_campaign(
        &self,
        catalog: &CampaignCatalog,
        campaign_id: &str,
    ) -> Result<Arc<Campaign>> {
        let campaign_id = campaign_id.trim();
        if !self.identity.is_allowed(campaign_id) {
            warn!(
                "User {} denied access to campaign {}",
                self.identity.user_id, campaign_id
            );
            return Err(InsightsError::AccessDenied(format!(
                "campaign '{}' is not available to this user",
                campaign_id
            )));
        }
        catalog
            .get(campaign_id)
            .ok_or_else(|| InsightsError::CampaignNotFound(campaign_id.to_string()))
    }

    /// Allowed campaigns of a selection, in catalog order.
    pub fn resolve(
        &self,
        catalog: &CampaignCatalog,
        selection: &CampaignSelection,
    ) -> Result<Vec<Arc<Campaign>>> {
        let requested: Vec<String> = match selection {
            CampaignSelection::All => catalog.ids(),
            CampaignSelection::Ids(ids) => ids.clone(),
        };

        let allowed: Vec<&String> = requested
            .iter()
            .filter(|id| self.identity.is_allowed(id))
            .collect();
        if allowed.is_empty() {
            warn!(
                "User {} has no access to any selected campaign",
                self.identity.user_id
            );
            return Err(InsightsError::AccessDenied(
                "no selected campaign is available to this user".to_string(),
            ));
        }
        if allowed.len() < requested.len() {
            debug!(
                "Selection narrowed from {} to {} campaigns for user {}",
                requested.len(),
                allowed.len(),
                self.identity.user_id
            );
        }

        let mut campaigns: Vec<Arc<Campaign>> = Vec::new();
        for id in allowed {
            match catalog.get(id) {
                Some(campaign) => campaigns.push(campaign),
                None => warn!("Selected campaign {} is not in the catalog", id),
            }
        }
        if campaigns.is_empty() {
            return Err(InsightsError::CampaignNotFound(
                requested.join(","),
            ));
        }

        let order = catalog.ids();
        campaigns.sort_by_key(|c| order.iter().position(|id| id == &c.id));
        Ok(campaigns)
    }

    /// Catalog entries the caller may list.
    pub fn visible(&self, catalog: &CampaignCatalog) -> Vec<Arc<Campaign>> {
        catalog
            .list()
            .iter()
            .filter(|c| self.identity.is_allowed(&c.id))
            .cloned()
            .collect()
    }
}
