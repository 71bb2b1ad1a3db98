//! Competitor Insights: binary entrypoint
//! Authenticates against the competitor service, mounts the dashboard core and
//! serves its view-model plus the push ingress over Axum.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use competitor_insights::api::{
    AuthService, AuthToken, Credentials, HttpAuthService, HttpCompetitorApi,
};
use competitor_insights::config::DashboardConfig;
use competitor_insights::metrics::Metrics;
use competitor_insights::server::{create_router, AppState};
use competitor_insights::{DashboardController, LocalPushHub, Session};

/// Compact logs by default; `DASHBOARD_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("competitor_insights=info,warn"));

    let json = std::env::var("DASHBOARD_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// `DASHBOARD_TOKEN` if present, else log in with `DASHBOARD_EMAIL` / `DASHBOARD_PASSWORD`.
async fn resolve_token(cfg: &DashboardConfig) -> anyhow::Result<AuthToken> {
    if let Ok(raw) = std::env::var("DASHBOARD_TOKEN") {
        if !raw.trim().is_empty() {
            return Ok(AuthToken::new(raw.trim()));
        }
    }

    let (Ok(email), Ok(password)) = (
        std::env::var("DASHBOARD_EMAIL"),
        std::env::var("DASHBOARD_PASSWORD"),
    ) else {
        bail!("set DASHBOARD_TOKEN or DASHBOARD_EMAIL + DASHBOARD_PASSWORD");
    };

    let auth = HttpAuthService::new(&cfg.api_base_url, cfg.request_timeout())?;
    let token = auth
        .login(&Credentials { email, password })
        .await
        .context("login")?;
    info!("logged in");
    Ok(token)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = DashboardConfig::load_default()?;
    let metrics = Metrics::init()?;
    let token = resolve_token(&cfg).await?;

    let api = HttpCompetitorApi::new(&cfg.api_base_url, token, cfg.request_timeout())?;
    let hub = LocalPushHub::new(cfg.push_buffer);
    let session = Session::new(Arc::new(api), Arc::new(hub.clone()));

    let dashboard = DashboardController::mount(session, cfg.controller());
    let app = create_router(AppState {
        dashboard: dashboard.clone(),
        hub,
    })
    .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, api = %cfg.api_base_url, "serving dashboard");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.logout().await?;
    Ok(())
}
