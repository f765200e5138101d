use crate::security::AccessController;
use crate::views::report::CampaignInfo;
use crate::views::service::InsightsService;

impl InsightsService {
    /// Campaigns the caller may open, in catalog order.
    pub fn list_campaigns(&self, access: &AccessController) -> Vec<CampaignInfo> {
        access
            .visible(&self.catalog)
            .iter()
            .map(|campaign| CampaignInfo::from(campaign.as_ref()))
            .collect()
    }
}
