// tests/metrics_dashboard.rs
#![cfg(feature = "strict-metrics")]
mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use common::{competitor, insight, mount, push, ready, until};
use competitor_insights::api::mock::MockCall;
use competitor_insights::api::MockApi;
use competitor_insights::metrics::Metrics;
use competitor_insights::{CompetitorDraft, LocalPushHub, NEW_INSIGHT_TOPIC};
use tower::ServiceExt;

#[tokio::test]
async fn dashboard_series_exposed_on_metrics_route() {
    // Only one recorder per process; this binary holds a single test.
    let metrics = Metrics::init().expect("recorder");

    let api = Arc::new(MockApi::new().with_competitors(vec![competitor("a", "Acme")]));
    api.set_insights(&"a".into(), vec![insight(Some("a1"), 1, "seed")]);
    let hub = LocalPushHub::default();
    let dash = mount(&api, &hub);
    ready(&dash).await;

    dash.select_competitor("a".into()).await.unwrap();
    until(&dash, |vm| vm.total_insights == 1).await;
    hub.publish(NEW_INSIGHT_TOPIC, push("a", insight(Some("a1"), 1, "seed")));
    until(&dash, |vm| vm.diagnostics.duplicate_pushes_ignored == 1).await;

    api.fail_next(MockCall::ListInsights("a".into()));
    dash.select_competitor("a".into()).await.unwrap();
    until(&dash, |vm| !vm.notices.is_empty()).await;

    dash.update_draft(CompetitorDraft::new(" ", "https://x.io"))
        .await
        .unwrap();
    dash.submit_new_competitor().await.unwrap();
    until(&dash, |vm| vm.draft_error.is_some()).await;

    let res = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    let out = String::from_utf8_lossy(&bytes);

    assert!(out.contains("dashboard_push_received_total"));
    assert!(out.contains("dashboard_push_duplicates_total"));
    assert!(out.contains("dashboard_fetch_errors_total"));
    assert!(out.contains(r#"op="list_insights""#));
    assert!(out.contains("dashboard_draft_rejected_total"));
    assert!(out.contains("dashboard_competitors"));

    dash.logout().await.unwrap();
}
