//! Demo that walks the dashboard through add → select → push against the
//! in-memory service and prints each resulting snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use competitor_insights::api::MockApi;
use competitor_insights::{
    CompetitorDraft, ControllerConfig, DashboardController, Insight, InsightId, LocalPushHub,
    PushRecord, Session, ViewModel, NEW_INSIGHT_TOPIC,
};

fn print(step: &str, vm: &ViewModel) {
    println!(
        "[{step}] rev={} list={:?} competitors={} focus={:?} insights={} chart={:?}",
        vm.revision,
        vm.list_state(),
        vm.competitors.len(),
        vm.focused_competitor_name,
        vm.total_insights,
        vm.chart_series.labels,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let api = Arc::new(MockApi::new());
    let hub = LocalPushHub::default();
    let dashboard = DashboardController::mount(
        Session::new(api.clone(), Arc::new(hub.clone())),
        ControllerConfig::default(),
    );

    let vm = dashboard.wait_for(|vm| !vm.loading_competitors).await?;
    print("loaded", &vm);

    dashboard
        .update_draft(CompetitorDraft::new("Acme", "https://acme.com"))
        .await?;
    dashboard.submit_new_competitor().await?;
    let vm = dashboard
        .wait_for(|vm| vm.competitors.len() == 1 && !vm.loading_competitors)
        .await?;
    print("added", &vm);

    let acme = vm.competitors[0].id.clone();
    let first = Insight {
        id: Some(InsightId::new("i1")),
        competitor_id: Some(acme.clone()),
        date: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid demo date"))?,
        summary: "Launched new pricing".into(),
        category: Some("pricing".into()),
    };
    api.set_insights(&acme, vec![first.clone()]);

    dashboard.select_competitor(acme.clone()).await?;
    let vm = dashboard
        .wait_for(|vm| vm.focused_competitor_id.as_ref() == Some(&acme))
        .await?;
    print("selected", &vm);

    // redelivery of an insight we already have
    hub.publish(
        NEW_INSIGHT_TOPIC,
        PushRecord {
            competitor_id: acme.clone(),
            insight: first,
        },
    );
    let vm = dashboard
        .wait_for(|vm| vm.diagnostics.duplicate_pushes_ignored == 1)
        .await?;
    print("duplicate push", &vm);

    tokio::time::sleep(Duration::from_millis(100)).await;
    dashboard.logout().await?;
    println!("dashboard-demo done");
    Ok(())
}
