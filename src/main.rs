use anyhow::{Context, Result};
use campaign_insights::config::InsightsConfig;
use campaign_insights::execution::{ColumnSupportCache, HttpQueryGateway};
use campaign_insights::filters::FilterSet;
use campaign_insights::security::{AccessController, CallerIdentity, CampaignSelection};
use campaign_insights::views::{InsightsService, ViewRequest};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "campaign-insights")]
#[command(about = "Filtered analytics over per-campaign schemas")]
struct Cli {
    /// Campaign catalog JSON (or set INSIGHTS_CATALOG_PATH)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Query gateway base URL (or set INSIGHTS_GATEWAY_URL)
    #[arg(long, global = true)]
    gateway_url: Option<String>,

    /// Caller id recorded in access logs
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    /// Comma list of campaign ids the caller may read; every catalog campaign when omitted
    #[arg(long, global = true)]
    allow: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List campaigns visible to the caller
    Campaigns,
    /// KPI metrics, charts and sample rows of one campaign
    Summary {
        campaign: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Monthly comparison of several campaigns
    Compare {
        /// Comma list of campaign ids or `all`
        #[arg(long, default_value = "all")]
        campaign_id: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Daily activity with moving averages
    Activity {
        campaign: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Weekly conversion funnel of one campaign or `all`
    Funnel {
        campaign: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Amount distribution, merchant pie and heatmap
    Redemptions {
        campaign: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Top IPs, atypical IPs and two-factor adoption
    Security {
        campaign: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Start date, YYYY-MM-DD
    #[arg(long)]
    from: Option<String>,
    /// End date, YYYY-MM-DD
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    login_type: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    user_ip: Option<String>,
    #[arg(long)]
    segment: Option<String>,
    #[arg(long)]
    user_type: Option<String>,
}

impl FilterArgs {
    fn request(&self) -> ViewRequest {
        let filters = FilterSet {
            login_type: self.login_type.clone(),
            user_id: self.user_id.clone(),
            user_ip: self.user_ip.clone(),
            segment: self.segment.clone(),
            user_type: self.user_type.clone(),
        };
        ViewRequest::new(self.from.as_deref(), self.to.as_deref(), filters)
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = InsightsConfig::from_env()?;
    if let Some(path) = cli.catalog.clone() {
        config.catalog_path = Some(path);
    }
    if let Some(url) = cli.gateway_url.clone() {
        config.gateway.base_url = url;
    }

    let catalog = Arc::new(config.load_catalog().context("loading campaign catalog")?);
    let gateway = Arc::new(HttpQueryGateway::new(&config.gateway)?);
    info!(
        "Campaign insights: {} campaigns, gateway {}",
        catalog.len(),
        gateway.endpoint()
    );

    let allowed: Vec<String> = match &cli.allow {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        None => catalog.ids(),
    };
    let access = AccessController::new(CallerIdentity::new(&cli.user, allowed));
    let service = InsightsService::new(
        catalog,
        gateway,
        Arc::new(ColumnSupportCache::new()),
        config.settings.clone(),
    );

    match &cli.command {
        Command::Campaigns => print_json(&service.list_campaigns(&access), cli.pretty)?,
        Command::Summary { campaign, filters } => {
            let report = service.summary(&access, campaign, &filters.request()).await?;
            print_json(&report, cli.pretty)?
        }
        Command::Compare {
            campaign_id,
            filters,
        } => {
            let selection = CampaignSelection::parse(Some(campaign_id.as_str()));
            let report = service.compare(&access, &selection, &filters.request()).await?;
            print_json(&report, cli.pretty)?
        }
        Command::Activity { campaign, filters } => {
            let report = service
                .daily_activity(&access, campaign, &filters.request())
                .await?;
            print_json(&report, cli.pretty)?
        }
        Command::Funnel { campaign, filters } => {
            let selection = CampaignSelection::parse(Some(campaign.as_str()));
            let report = service
                .weekly_funnel(&access, &selection, &filters.request())
                .await?;
            print_json(&report, cli.pretty)?
        }
        Command::Redemptions { campaign, filters } => {
            let report = service
                .redemption_insights(&access, campaign, &filters.request())
                .await?;
            print_json(&report, cli.pretty)?
        }
        Command::Security { campaign, filters } => {
            let report = service
                .login_security(&access, campaign, &filters.request())
                .await?;
            print_json(&report, cli.pretty)?
        }
    }

    Ok(())
}
