//! Campaign summary: KPI metrics, charts and a sample of recent rows
//!
//! All fragments of the campaign are dispatched at once. A failing fragment
//! only blanks its own metric or chart and leaves a note.

use crate::error::{InsightsError, Result};
use crate::rows::scalar;
use crate::security::AccessController;
use crate::views::report::{AppliedFilters, CampaignInfo, CampaignSummary, ChartData, MetricValue};
use crate::views::service::{InsightsService, ViewRequest};
use tracing::{info, warn};

impl InsightsService {
    pub async fn summary(
        &self,
        access: &AccessController,
        campaign_id: &str,
        request: &ViewRequest,
    ) -> Result<CampaignSummary> {
        let campaign = access.authorize_campaign(&self.catalog, campaign_id)?;
        let request = request.login_scoped();

        let mut queries = Vec::new();
        for metric in &campaign.metrics {
            queries.push(self.compose(&campaign, &metric.spec(), &request)?);
        }
        for chart in &campaign.charts {
            queries.push(self.compose(&campaign, &chart.spec(), &request)?);
        }
        if let Some(spec) = campaign.sample_spec() {
            queries.push(self.compose(&campaign, &spec, &request)?);
        }

        let total = queries.len();
        info!("Summary for {}: {} fragments", campaign.id, total);
        let mut results = self
            .executor
            .run_all(&campaign.database, queries)
            .await
            .into_iter();

        let mut notes = Vec::new();
        let mut failed = 0;

        let mut metrics = Vec::with_capacity(campaign.metrics.len());
        for metric in &campaign.metrics {
            let value = match results.next() {
                Some(Ok(rows)) => Some(scalar(&rows).unwrap_or(0.0)),
                Some(Err(e)) => {
                    failed += 1;
                    warn!("Metric {} failed for {}: {}", metric.key, campaign.id, e);
                    notes.push(format!("Metric '{}' unavailable: {}", metric.label, e));
                    None
                }
                None => None,
            };
            metrics.push(MetricValue {
                key: metric.key.clone(),
                label: metric.label.clone(),
                value,
            });
        }

        let mut charts = Vec::with_capacity(campaign.charts.len());
        for chart in &campaign.charts {
            let rows = match results.next() {
                Some(Ok(rows)) => rows,
                Some(Err(e)) => {
                    failed += 1;
                    warn!("Chart {} failed for {}: {}", chart.key, campaign.id, e);
                    notes.push(format!("Chart '{}' unavailable: {}", chart.title, e));
                    Vec::new()
                }
                None => Vec::new(),
            };
            charts.push(ChartData {
                key: chart.key.clone(),
                title: chart.title.clone(),
                rows,
            });
        }

        let sample = match results.next() {
            Some(Ok(rows)) => rows,
            Some(Err(e)) => {
                failed += 1;
                notes.push(format!("Sample rows unavailable: {}", e));
                Vec::new()
            }
            None => Vec::new(),
        };

        if total > 0 && failed == total {
            return Err(InsightsError::UpstreamQuery(format!(
                "every query for campaign '{}' failed",
                campaign.name
            )));
        }

        Ok(CampaignSummary {
            campaign: CampaignInfo::from(campaign.as_ref()),
            filters: AppliedFilters::from(&request),
            metrics,
            charts,
            sample,
            notes,
        })
    }
}
