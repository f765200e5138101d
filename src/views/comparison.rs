//! Multi-campaign monthly comparison
//!
//! Campaigns are processed one after another, each with its streams fetched
//! concurrently. A campaign whose fetch fails is left out with a note.

use crate::aggregate::{rank_descending, totals_score, CampaignGoal, PeriodGrain};
use crate::catalog::fragments::{campaign_goal, StreamKind};
use crate::catalog::Campaign;
use crate::error::{InsightsError, Result};
use crate::security::{AccessController, CampaignSelection};
use crate::views::report::{
    AppliedFilters, CampaignComparison, ComparisonMetadata, ComparisonReport, MonthlyPoint,
};
use crate::views::service::{InsightsService, ViewRequest};
use tracing::{info, warn};

impl InsightsService {
    pub async fn compare(
        &self,
        access: &AccessController,
        selection: &CampaignSelection,
        request: &ViewRequest,
    ) -> Result<ComparisonReport> {
        let campaigns = access.resolve(&self.catalog, selection)?;
        let request = request.login_scoped();

        let mut entries = Vec::with_capacity(campaigns.len());
        let mut notes = Vec::new();
        for campaign in &campaigns {
            match self.monthly_comparison(campaign, &request).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Dropping campaign {} from comparison: {}", campaign.id, e);
                    notes.push(format!("Campaign '{}' omitted: {}", campaign.name, e));
                }
            }
        }

        if entries.is_empty() {
            return Err(InsightsError::UpstreamQuery(notes.join("; ")));
        }

        rank_descending(&mut entries, |e| e.latest_score, |e| e.name.as_str());
        info!(
            "Compared {} of {} campaigns",
            entries.len(),
            campaigns.len()
        );

        Ok(ComparisonReport {
            metadata: ComparisonMetadata {
                requested: campaigns.len(),
                returned: entries.len(),
                filters: AppliedFilters::from(&request),
                notes,
            },
            campaigns: entries,
        })
    }

    async fn monthly_comparison(
        &self,
        campaign: &Campaign,
        request: &ViewRequest,
    ) -> Result<CampaignComparison> {
        let goal_query = self.compose(campaign, &campaign_goal().spec(), &ViewRequest::default())?;
        let grain = PeriodGrain::Month;

        let (mut series, redemptions, awards, tracings, goal_rows) = tokio::try_join!(
            self.fetch_stream(campaign, StreamKind::Logins, grain, request),
            self.fetch_stream(campaign, StreamKind::Redemptions, grain, request),
            self.fetch_stream(campaign, StreamKind::Awards, grain, request),
            self.fetch_stream(campaign, StreamKind::Tracings, grain, request),
            self.run(campaign, goal_query),
        )?;
        series.merge(redemptions);
        series.merge(awards);
        series.merge(tracings);

        let goal = CampaignGoal::from_rows(&goal_rows);
        let weights = &self.settings.score_weights;
        let months: Vec<MonthlyPoint> = series
            .finalize()
            .into_iter()
            .map(|point| MonthlyPoint {
                score: totals_score(weights, &point.totals, &goal),
                cumulative_score: totals_score(weights, &point.cumulative, &goal),
                month: point.period,
                totals: point.totals,
                cumulative: point.cumulative,
            })
            .collect();
        let latest_score = months.last().map(|m| m.cumulative_score).unwrap_or(0.0);

        Ok(CampaignComparison {
            campaign_id: campaign.id.clone(),
            name: campaign.name.clone(),
            goal,
            months,
            latest_score,
        })
    }
}
