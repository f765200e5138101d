use crate::aggregate::{moving_average, PeriodGrain, PeriodTotals};
use crate::catalog::fragments::StreamKind;
use crate::error::Result;
use crate::security::AccessController;
use crate::views::report::{ActivityReport, AppliedFilters, CampaignInfo, DailyActivityPoint};
use crate::views::service::{InsightsService, ViewRequest};

impl InsightsService {
    /// Daily series with trailing moving averages of logins and redemptions.
    ///
    /// Days without any event are absent, not zero-filled.
    pub async fn daily_activity(
        &self,
        access: &AccessController,
        campaign_id: &str,
        request: &ViewRequest,
    ) -> Result<ActivityReport> {
        let campaign = access.authorize_campaign(&self.catalog, campaign_id)?;
        let grain = PeriodGrain::Day;

        let (mut series, registrations, redemptions, awards) = tokio::try_join!(
            self.fetch_stream(&campaign, StreamKind::Logins, grain, request),
            self.fetch_stream(&campaign, StreamKind::Registrations, grain, request),
            self.fetch_stream(&campaign, StreamKind::Redemptions, grain, request),
            self.fetch_stream(&campaign, StreamKind::Awards, grain, request),
        )?;
        series.merge(registrations);
        series.merge(redemptions);
        series.merge(awards);

        let points = series.finalize();
        let window = self.settings.moving_average_window;
        let logins: Vec<f64> = points.iter().map(|p| p.totals.logins).collect();
        let redemptions: Vec<f64> = points.iter().map(|p| p.totals.redemptions).collect();
        let logins_ma = moving_average(&logins, window);
        let redemptions_ma = moving_average(&redemptions, window);

        let totals = points
            .last()
            .map(|p| p.cumulative)
            .unwrap_or_else(PeriodTotals::default);
        let days = points
            .into_iter()
            .zip(logins_ma.into_iter().zip(redemptions_ma))
            .map(|(point, (logins_avg, redemptions_avg))| DailyActivityPoint {
                date: point.period,
                registrations: point.totals.registrations,
                logins: point.totals.logins,
                login_users: point.totals.login_users,
                redemptions: point.totals.redemptions,
                redeemers: point.totals.redeemers,
                redeemed_value: point.totals.redeemed_value,
                winners: point.totals.winners,
                logins_moving_average: logins_avg,
                redemptions_moving_average: redemptions_avg,
            })
            .collect();

        Ok(ActivityReport {
            campaign: CampaignInfo::from(campaign.as_ref()),
            filters: AppliedFilters::from(request),
            window,
            days,
            totals,
        })
    }
}
