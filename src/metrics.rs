use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "dashboard_fetch_errors_total",
            "Failed competitor-service calls, by op."
        );
        describe_counter!(
            "dashboard_stale_results_total",
            "Insight loads discarded because a newer selection was issued."
        );
        describe_counter!(
            "dashboard_push_received_total",
            "Records received on the new-insight topic."
        );
        describe_counter!(
            "dashboard_push_duplicates_total",
            "Pushed insights ignored as redeliveries."
        );
        describe_counter!(
            "dashboard_push_unfocused_total",
            "Pushed insights for a competitor other than the focus."
        );
        describe_counter!(
            "dashboard_draft_rejected_total",
            "Competitor drafts rejected by validation."
        );
        describe_gauge!("dashboard_competitors", "Competitors currently listed.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register dashboard series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
