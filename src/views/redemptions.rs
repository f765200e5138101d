use crate::aggregate::round_to;
use crate::catalog::fragments::{amount_distribution, merchant_amount_matrix, merchant_breakdown};
use crate::error::Result;
use crate::heuristics::heatmap;
use crate::security::AccessController;
use crate::views::report::{AppliedFilters, CampaignInfo, RedemptionReport};
use crate::views::service::{InsightsService, ViewRequest};

impl InsightsService {
    /// Amount distribution, merchant pie and merchant × amount heatmap.
    pub async fn redemption_insights(
        &self,
        access: &AccessController,
        campaign_id: &str,
        request: &ViewRequest,
    ) -> Result<RedemptionReport> {
        let campaign = access.authorize_campaign(&self.catalog, campaign_id)?;
        let (amount_fragment, merchant_fragment, matrix_fragment) = (
            amount_distribution(),
            merchant_breakdown(),
            merchant_amount_matrix(),
        );
        let amount_spec = amount_fragment.spec();
        let merchant_spec = merchant_fragment.spec();
        let matrix_spec = matrix_fragment.spec();

        let (amount_rows, merchant_rows, matrix_rows) = tokio::try_join!(
            self.fetch(&campaign, &amount_spec, request),
            self.fetch(&campaign, &merchant_spec, request),
            self.fetch(&campaign, &matrix_spec, request),
        )?;

        let breakdown = &self.settings.breakdown;
        let amounts = heatmap::amount_distribution(&amount_rows);
        let total_redemptions: u64 = amounts.iter().map(|b| b.redemptions).sum();
        let total_value = round_to(amounts.iter().map(|b| b.redeemed_value).sum(), 2);

        Ok(RedemptionReport {
            campaign: CampaignInfo::from(campaign.as_ref()),
            filters: AppliedFilters::from(request),
            total_redemptions,
            total_value,
            amounts,
            merchants: heatmap::merchant_pie(&merchant_rows, breakdown.pie_merchants),
            heatmap: heatmap::merchant_amount_heatmap(&matrix_rows, breakdown),
        })
    }
}
