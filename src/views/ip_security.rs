//! Login and IP security view
//!
//! Top IPs, IP × user detail, atypical IP scoring and weekly two-factor
//! adoption. Each part degrades on its own; older schemas without
//! `mc_redemptions.ip` skip anomaly scoring.

use crate::catalog::fragments::{
    ip_idmask_detail, logins_by_ip, redemptions_by_ip, redemptions_by_ip_idmask, top_ips,
};
use crate::error::{InsightsError, Result};
use crate::filters::capability::{IP_COLUMN, REDEMPTIONS_TABLE};
use crate::heuristics::two_factor::{adoption_query, summarize};
use crate::heuristics::AnomalyScorer;
use crate::rows::Row;
use crate::security::AccessController;
use crate::views::report::{
    AppliedFilters, CampaignInfo, IpActivity, IpUserActivity, SecurityReport,
};
use crate::views::service::{InsightsService, ViewRequest};
use tracing::warn;

impl InsightsService {
    pub async fn login_security(
        &self,
        access: &AccessController,
        campaign_id: &str,
        request: &ViewRequest,
    ) -> Result<SecurityReport> {
        let campaign = access.authorize_campaign(&self.catalog, campaign_id)?;
        let redemption_ips_tracked = self
            .column_cache
            .column_exists(
                self.executor.gateway(),
                &campaign.database,
                REDEMPTIONS_TABLE,
                IP_COLUMN,
            )
            .await;

        let top = top_ips(self.settings.top_ip_limit);
        let detail = ip_idmask_detail(self.settings.ip_detail_limit);
        let by_ip = logins_by_ip();
        let redeemed_by_ip = redemptions_by_ip();
        let redeemed_by_ip_user = redemptions_by_ip_idmask();
        let (top_spec, detail_spec, by_ip_spec) = (top.spec(), detail.spec(), by_ip.spec());
        let (redeemed_spec, redeemed_user_spec) =
            (redeemed_by_ip.spec(), redeemed_by_ip_user.spec());
        let adoption = adoption_query(
            &self.injector,
            &campaign.database,
            &request.filters,
            request.range(),
        )?;

        let redemption_rows = async {
            if !redemption_ips_tracked {
                return Ok(None);
            }
            let rows = tokio::try_join!(
                self.fetch(&campaign, &redeemed_spec, request),
                self.fetch(&campaign, &redeemed_user_spec, request),
            )?;
            Ok::<_, InsightsError>(Some(rows))
        };

        let (top_rows, detail_rows, login_ip_rows, adoption_rows, redemption_rows) = tokio::join!(
            self.fetch(&campaign, &top_spec, request),
            self.fetch(&campaign, &detail_spec, request),
            self.fetch(&campaign, &by_ip_spec, request),
            self.run(&campaign, adoption),
            redemption_rows,
        );

        let mut notes = Vec::new();
        let mut failed = 0;
        let mut recover = |section: &str, result: Result<Vec<Row>>| -> Option<Vec<Row>> {
            match result {
                Ok(rows) => Some(rows),
                Err(e) => {
                    warn!("{} failed for {}: {}", section, campaign.id, e);
                    notes.push(format!("{} unavailable: {}", section, e));
                    failed += 1;
                    None
                }
            }
        };

        let top_ips: Vec<IpActivity> = recover("Top IPs", top_rows)
            .unwrap_or_default()
            .iter()
            .filter_map(IpActivity::from_row)
            .collect();
        let ip_users: Vec<IpUserActivity> = recover("IP detail", detail_rows)
            .unwrap_or_default()
            .iter()
            .filter_map(IpUserActivity::from_row)
            .collect();
        let two_factor = recover("Two-factor adoption", adoption_rows)
            .map(|rows| summarize(&rows, &self.settings.adoption));

        let anomalies = match (login_ip_rows, redemption_rows) {
            (_, Ok(None)) => {
                notes.push(format!(
                    "Redemption IPs are not recorded for campaign '{}'; anomaly scoring skipped",
                    campaign.name
                ));
                Vec::new()
            }
            (Ok(login_rows), Ok(Some((by_ip_rows, by_ip_user_rows)))) => {
                AnomalyScorer::new(self.settings.anomaly.clone()).score_rows(
                    &login_rows,
                    &by_ip_rows,
                    &by_ip_user_rows,
                )
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Anomaly scoring failed for {}: {}", campaign.id, e);
                notes.push(format!("Anomaly scoring unavailable: {}", e));
                failed += 1;
                Vec::new()
            }
        };

        let sections = if redemption_ips_tracked { 4 } else { 3 };
        if failed == sections {
            return Err(InsightsError::UpstreamQuery(format!(
                "every security query for campaign '{}' failed",
                campaign.name
            )));
        }

        Ok(SecurityReport {
            campaign: CampaignInfo::from(campaign.as_ref()),
            filters: AppliedFilters::from(request),
            top_ips,
            ip_users,
            anomalies,
            redemption_ips_tracked,
            two_factor,
            notes,
        })
    }
}
