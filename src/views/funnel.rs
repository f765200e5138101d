//! Weekly conversion funnel: registered, logged in, redeemed, awarded
//!
//! With several campaigns selected the weekly cohorts are summed; campaigns
//! that fail are left out with a note.

use crate::aggregate::{round_to, safe_ratio, PeriodAccumulator, PeriodGrain, PeriodTotals};
use crate::catalog::fragments::StreamKind;
use crate::catalog::Campaign;
use crate::error::{InsightsError, Result};
use crate::rows::parse_date;
use crate::security::{AccessController, CampaignSelection};
use crate::views::report::{AppliedFilters, CampaignInfo, FunnelReport, FunnelStages, FunnelWeek};
use crate::views::service::{InsightsService, ViewRequest};
use chrono::Duration;
use tracing::warn;

impl InsightsService {
    pub async fn weekly_funnel(
        &self,
        access: &AccessController,
        selection: &CampaignSelection,
        request: &ViewRequest,
    ) -> Result<FunnelReport> {
        let campaigns = match selection {
            CampaignSelection::Ids(ids) if ids.len() == 1 => {
                vec![access.authorize_campaign(&self.catalog, &ids[0])?]
            }
            _ => access.resolve(&self.catalog, selection)?,
        };

        let mut combined = PeriodAccumulator::new(PeriodGrain::Week);
        let mut included = Vec::new();
        let mut notes = Vec::new();
        for campaign in &campaigns {
            match self.funnel_series(campaign, request).await {
                Ok(series) => {
                    combined.merge(series);
                    included.push(CampaignInfo::from(campaign.as_ref()));
                }
                Err(e) => {
                    warn!("Dropping campaign {} from funnel: {}", campaign.id, e);
                    notes.push(format!("Campaign '{}' omitted: {}", campaign.name, e));
                }
            }
        }
        if included.is_empty() {
            return Err(InsightsError::UpstreamQuery(notes.join("; ")));
        }

        let points = combined.finalize();
        let totals = points
            .last()
            .map(|p| funnel_stages(&p.cumulative))
            .unwrap_or_default();
        let weeks = points
            .into_iter()
            .map(|point| FunnelWeek {
                week_end: parse_date(&point.period)
                    .map(|d| (d + Duration::days(6)).format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                stages: funnel_stages(&point.totals),
                week_start: point.period,
            })
            .collect();

        let scope = match selection {
            CampaignSelection::All => "all".to_string(),
            CampaignSelection::Ids(ids) => ids.join(","),
        };
        Ok(FunnelReport {
            scope,
            campaigns: included,
            filters: AppliedFilters::from(request),
            weeks,
            totals,
            notes,
        })
    }

    async fn funnel_series(
        &self,
        campaign: &Campaign,
        request: &ViewRequest,
    ) -> Result<PeriodAccumulator> {
        let grain = PeriodGrain::Week;
        let (mut series, logins, redemptions, awards) = tokio::try_join!(
            self.fetch_stream(campaign, StreamKind::Registrations, grain, request),
            self.fetch_stream(campaign, StreamKind::Logins, grain, request),
            self.fetch_stream(campaign, StreamKind::Redemptions, grain, request),
            self.fetch_stream(campaign, StreamKind::Awards, grain, request),
        )?;
        series.merge(logins);
        series.merge(redemptions);
        series.merge(awards);
        Ok(series)
    }
}

/// Stage counts with step conversion rates (4 decimals).
pub fn funnel_stages(totals: &PeriodTotals) -> FunnelStages {
    FunnelStages {
        registered: totals.registrations,
        logged_in: totals.login_users,
        redeemed: totals.redeemers,
        awarded: totals.winners,
        login_rate: round_to(safe_ratio(totals.login_users, totals.registrations), 4),
        redemption_rate: round_to(safe_ratio(totals.redeemers, totals.login_users), 4),
        award_rate: round_to(safe_ratio(totals.winners, totals.redeemers), 4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funnel_stage_rates() {
        let stages = funnel_stages(&PeriodTotals {
            registrations: 200.0,
            login_users: 150.0,
            redeemers: 50.0,
            winners: 0.0,
            ..Default::default()
        });
        assert_eq!(stages.login_rate, 0.75);
        assert_eq!(stages.redemption_rate, 0.3333);
        assert_eq!(stages.award_rate, 0.0);

        let empty = funnel_stages(&PeriodTotals::default());
        assert_eq!(empty.login_rate, 0.0);
    }
}
