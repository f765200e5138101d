use campaign_insights::catalog::CampaignCatalog;
use campaign_insights::config::AnalysisSettings;
use campaign_insights::error::InsightsError;
use campaign_insights::execution::{ColumnSupportCache, ScriptedGateway};
use campaign_insights::filters::FilterSet;
use campaign_insights::heuristics::Severity;
use campaign_insights::security::{AccessController, CallerIdentity, CampaignSelection};
use campaign_insights::views::{InsightsService, ViewRequest};
use serde_json::json;
use std::sync::Arc;

const CATALOG: &str = r#"{
    "campaigns": [
        {"id": "spring", "name": "Spring Rewards", "database": "mc_spring"},
        {"id": "summer", "name": "Summer Cashback", "database": "mc_summer",
         "description": "Cashback on summer purchases"}
    ]
}"#;

fn catalog() -> Arc<CampaignCatalog> {
    Arc::new(CampaignCatalog::from_json_str(CATALOG).unwrap())
}

fn service_with(gateway: Arc<ScriptedGateway>, settings: AnalysisSettings) -> InsightsService {
    InsightsService::new(
        catalog(),
        gateway,
        Arc::new(ColumnSupportCache::new()),
        settings,
    )
}

fn service(gateway: Arc<ScriptedGateway>) -> InsightsService {
    service_with(gateway, AnalysisSettings::default())
}

fn full_access() -> AccessController {
    AccessController::new(CallerIdentity::new("analyst", ["spring", "summer"]))
}

#[tokio::test]
async fn test_list_campaigns_respects_allowed_ids() {
    let service = service(Arc::new(ScriptedGateway::new()));
    let access = AccessController::new(CallerIdentity::new("analyst", ["summer"]));

    let campaigns = service.list_campaigns(&access);
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].id, "summer");
    assert_eq!(campaigns[0].description, "Cashback on summer purchases");
    assert!(!campaigns[0].metrics.is_empty());
}

#[tokio::test]
async fn test_denied_campaign_issues_no_queries() {
    let gateway = Arc::new(ScriptedGateway::new());
    let service = service(gateway.clone());
    let access = AccessController::new(CallerIdentity::new("analyst", ["spring"]));

    let err = service
        .summary(&access, "summer", &ViewRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::AccessDenied(_)));
    assert_eq!(err.status_code(), 403);
    assert_eq!(gateway.request_count(), 0);
}

#[tokio::test]
async fn test_unknown_campaign_is_not_found() {
    let service = service(Arc::new(ScriptedGateway::new()));
    let access = AccessController::new(CallerIdentity::new("analyst", ["ghost"]));

    let err = service
        .daily_activity(&access, "ghost", &ViewRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_summary_keeps_working_metrics_when_some_fail() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .on("COUNT(*) AS value FROM mc_spring.mc_logins", vec![json!({"value": 42})])
            .fail_on("mc_spring.mc_redemptions"),
    );
    let service = service(gateway);

    let summary = service
        .summary(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    let logins = summary.metrics.iter().find(|m| m.key == "total_logins").unwrap();
    assert_eq!(logins.value, Some(42.0));
    let redemptions = summary
        .metrics
        .iter()
        .find(|m| m.key == "total_redemptions")
        .unwrap();
    assert_eq!(redemptions.value, None);
    let users = summary.metrics.iter().find(|m| m.key == "total_users").unwrap();
    assert_eq!(users.value, Some(0.0));

    assert!(summary.notes.iter().any(|n| n.contains("Redemptions")));
    assert!(summary.notes.iter().any(|n| n.contains("Top merchants")));
}

#[tokio::test]
async fn test_summary_fails_when_every_query_fails() {
    let gateway = Arc::new(ScriptedGateway::new().fail_database("mc_spring"));
    let service = service(gateway);

    let err = service
        .summary(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::UpstreamQuery(_)));
}

#[tokio::test]
async fn test_comparison_omits_failing_campaign_with_note() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .on(
                "AS login_users FROM",
                vec![
                    json!({"period": "2024-01", "logins": 30, "login_users": 20}),
                    json!({"period": "2024-02", "logins": 50, "login_users": 40}),
                ],
            )
            .on(
                "AS redeemed_value FROM",
                vec![json!({"period": "2024-02", "redemptions": 12, "redeemers": 10, "redeemed_value": 300.0})],
            )
            .on(
                "AS target_value FROM",
                vec![json!({"target_users": 100, "target_value": 1000})],
            )
            .fail_database("mc_summer"),
    );
    let service = service(gateway);

    let report = service
        .compare(&full_access(), &CampaignSelection::All, &ViewRequest::default())
        .await
        .unwrap();

    assert_eq!(report.campaigns.len(), 1);
    assert_eq!(report.campaigns[0].campaign_id, "spring");
    assert_eq!(report.metadata.requested, 2);
    assert_eq!(report.metadata.returned, 1);
    assert_eq!(report.metadata.notes.len(), 1);
    assert!(report.metadata.notes[0].contains("Summer Cashback"));
    assert!(report.metadata.notes[0].contains("omitted"));

    let months: Vec<&str> = report.campaigns[0]
        .months
        .iter()
        .map(|m| m.month.as_str())
        .collect();
    assert_eq!(months, vec!["2024-01", "2024-02"]);
    let february = &report.campaigns[0].months[1];
    assert_eq!(february.cumulative.login_users, 60.0);
    assert_eq!(february.totals.redeemers, 10.0);
    assert!(report.campaigns[0].latest_score > 0.0);
}

#[tokio::test]
async fn test_comparison_fails_when_no_campaign_succeeds() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .fail_database("mc_spring")
            .fail_database("mc_summer"),
    );
    let service = service(gateway);

    let err = service
        .compare(&full_access(), &CampaignSelection::All, &ViewRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_comparison_goal_ignores_filters() {
    let gateway = Arc::new(ScriptedGateway::new());
    let service = service(gateway.clone());
    let request = ViewRequest::new(
        Some("2024-01-01"),
        Some("2024-01-31"),
        FilterSet::new().with_login_type("1"),
    );

    service
        .compare(
            &full_access(),
            &CampaignSelection::parse(Some("spring")),
            &request,
        )
        .await
        .unwrap();

    let goal = gateway.requests_matching("AS target_value");
    assert_eq!(goal.len(), 1);
    assert!(!goal[0].sql.contains("WHERE"));
    assert!(goal[0].parameters.is_empty());

    let logins = gateway.requests_matching("AS login_users FROM mc_spring.mc_logins");
    assert_eq!(logins.len(), 1);
    assert!(logins[0].sql.contains("date BETWEEN %s AND %s"));
    assert!(logins[0].sql.contains("type = %s"));
}

#[tokio::test]
async fn test_daily_activity_moving_averages() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .on(
                "AS login_users FROM",
                vec![
                    json!({"period": "2024-03-01", "logins": 10, "login_users": 8}),
                    json!({"period": "2024-03-02", "logins": 20, "login_users": 15}),
                    json!({"period": "2024-03-03", "logins": 31, "login_users": 20}),
                ],
            )
            .on(
                "AS redeemed_value FROM",
                vec![json!({"period": "2024-03-02", "redemptions": 4, "redeemers": 3, "redeemed_value": 80})],
            ),
    );
    let settings = AnalysisSettings {
        moving_average_window: 2,
        ..AnalysisSettings::default()
    };
    let service = service_with(gateway, settings);

    let report = service
        .daily_activity(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    assert_eq!(report.window, 2);
    let dates: Vec<&str> = report.days.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
    assert_eq!(report.days[0].logins_moving_average, None);
    assert_eq!(report.days[1].logins_moving_average, Some(15.0));
    assert_eq!(report.days[2].logins_moving_average, Some(25.5));
    assert_eq!(report.days[2].redemptions_moving_average, Some(2.0));
    assert_eq!(report.totals.logins, 61.0);
    assert_eq!(report.totals.redeemed_value, 80.0);
}

#[tokio::test]
async fn test_funnel_all_sums_weekly_cohorts() {
    let week = "2024-03-04";
    let mut gateway = ScriptedGateway::new();
    for db in ["mc_spring", "mc_summer"] {
        gateway = gateway
            .on_database(
                db,
                "AS registrations FROM",
                vec![json!({"period": week, "registrations": 100})],
            )
            .on_database(
                db,
                "AS login_users FROM",
                vec![json!({"period": week, "logins": 90, "login_users": 50})],
            )
            .on_database(
                db,
                "AS redeemed_value FROM",
                vec![json!({"period": week, "redemptions": 30, "redeemers": 25, "redeemed_value": 500})],
            );
    }
    let service = service(Arc::new(gateway));

    let report = service
        .weekly_funnel(&full_access(), &CampaignSelection::All, &ViewRequest::default())
        .await
        .unwrap();

    assert_eq!(report.scope, "all");
    assert_eq!(report.campaigns.len(), 2);
    assert_eq!(report.weeks.len(), 1);
    let first = &report.weeks[0];
    assert_eq!(first.week_start, week);
    assert_eq!(first.week_end, "2024-03-10");
    assert_eq!(first.stages.registered, 200.0);
    assert_eq!(first.stages.logged_in, 100.0);
    assert_eq!(first.stages.redeemed, 50.0);
    assert_eq!(first.stages.login_rate, 0.5);
    assert_eq!(first.stages.redemption_rate, 0.5);
    assert_eq!(report.totals.registered, 200.0);
    assert!(report.notes.is_empty());
}

#[tokio::test]
async fn test_funnel_single_campaign_requires_access() {
    let service = service(Arc::new(ScriptedGateway::new()));
    let access = AccessController::new(CallerIdentity::new("analyst", ["spring"]));

    let err = service
        .weekly_funnel(
            &access,
            &CampaignSelection::parse(Some("summer")),
            &ViewRequest::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_redemption_insights_breakdowns() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .on(
                "SELECT amount, COUNT(*) AS redemptions",
                vec![
                    json!({"amount": 10, "redemptions": 5, "redeemed_value": 50}),
                    json!({"amount": 25, "redemptions": 2, "redeemed_value": 50}),
                ],
            )
            .on(
                "SELECT merchant, COUNT(*) AS redemptions",
                vec![
                    json!({"merchant": "Cafe", "redemptions": 4, "redeemed_value": 40}),
                    json!({"merchant": "Books", "redemptions": 3, "redeemed_value": 60}),
                ],
            )
            .on(
                "SELECT merchant, amount, COUNT(*) AS redemptions",
                vec![
                    json!({"merchant": "Cafe", "amount": 10, "redemptions": 4}),
                    json!({"merchant": "Books", "amount": 10, "redemptions": 1}),
                    json!({"merchant": "Books", "amount": 25, "redemptions": 2}),
                ],
            ),
    );
    let service = service(gateway);

    let report = service
        .redemption_insights(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    assert_eq!(report.total_redemptions, 7);
    assert_eq!(report.total_value, 100.0);
    assert_eq!(report.amounts.len(), 2);
    assert_eq!(report.merchants.len(), 2);
    assert_eq!(report.heatmap.merchants.len(), 2);
    assert_eq!(report.heatmap.max_value, 4);
}

fn security_gateway() -> ScriptedGateway {
    ScriptedGateway::new()
        .on(
            "mc_logins WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip ORDER BY",
            vec![json!({"ip": "10.0.0.1", "logins": 20, "unique_users": 6,
                        "first_seen": "2024-03-01 08:00:00", "last_seen": "2024-03-01 18:00:00"})],
        )
        .on(
            "mc_logins WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip;",
            vec![json!({"ip": "10.0.0.1", "logins": 20, "unique_users": 6,
                        "first_seen": "2024-03-01 08:00:00", "last_seen": "2024-03-01 18:00:00"})],
        )
        .on(
            "GROUP BY ip, idmask ORDER BY",
            vec![json!({"ip": "10.0.0.1", "idmask": "u1", "logins": 12})],
        )
        .on(
            "AS active_days",
            vec![json!({"ip": "10.0.0.1", "redemptions": 15, "redeemers": 1, "active_days": 1,
                        "first_seen": "2024-03-01 10:00:00", "last_seen": "2024-03-01 12:00:00"})],
        )
        .on(
            "mc_redemptions WHERE ip IS NOT NULL AND ip <> '' GROUP BY ip, idmask",
            vec![json!({"ip": "10.0.0.1", "idmask": "u1", "redemptions": 15})],
        )
        .on(
            "AS users_with_two_factor",
            vec![json!({"week_start": "2024-02-26", "segment": "gold",
                        "users_with_two_factor": 7, "total_users": 10})],
        )
}

#[tokio::test]
async fn test_login_security_scores_atypical_ips() {
    let gateway = Arc::new(
        security_gateway().on("SHOW COLUMNS", vec![json!({"Field": "ip", "Type": "varchar(45)"})]),
    );
    let service = service(gateway.clone());

    let report = service
        .login_security(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    assert!(report.redemption_ips_tracked);
    assert_eq!(report.top_ips.len(), 1);
    assert_eq!(report.ip_users[0].idmask, "u1");
    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].ip, "10.0.0.1");
    assert_eq!(report.anomalies[0].severity, Severity::High);
    assert!(report.two_factor.is_some());
    assert!(report.notes.is_empty());

    // the probe result is cached per schema
    service
        .login_security(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();
    assert_eq!(gateway.requests_matching("SHOW COLUMNS").len(), 1);
}

#[tokio::test]
async fn test_login_security_without_redemption_ips() {
    let gateway = Arc::new(security_gateway());
    let service = service(gateway.clone());

    let report = service
        .login_security(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    assert!(!report.redemption_ips_tracked);
    assert!(report.anomalies.is_empty());
    assert_eq!(report.top_ips.len(), 1);
    assert!(report.notes.iter().any(|n| n.contains("anomaly scoring skipped")));
    assert!(gateway.requests_matching("FROM mc_spring.mc_redemptions").is_empty());
}

#[tokio::test]
async fn test_login_security_degrades_per_section() {
    let gateway = Arc::new(security_gateway().fail_on("AS users_with_two_factor"));
    let service = service(gateway);

    let report = service
        .login_security(&full_access(), "spring", &ViewRequest::default())
        .await
        .unwrap();

    assert!(report.two_factor.is_none());
    assert_eq!(report.top_ips.len(), 1);
    assert!(report
        .notes
        .iter()
        .any(|n| n.starts_with("Two-factor adoption unavailable")));
}
