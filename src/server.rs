// src/server.rs
//! Thin HTTP shell: exposes the dashboard view-model and action handlers, and
//! accepts already-parsed push records for the local hub.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::controller::DashboardHandle;
use crate::error::DashboardError;
use crate::model::{CompetitorDraft, CompetitorId, PushRecord};
use crate::push::{LocalPushHub, NEW_INSIGHT_TOPIC};
use crate::view::ViewModel;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
    pub hub: LocalPushHub,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/dashboard", get(get_view))
        .route("/dashboard/draft", put(put_draft))
        .route("/dashboard/competitors", post(submit_competitor))
        .route("/dashboard/select/{id}", post(select_competitor))
        .route("/dashboard/notices/{id}", delete(dismiss_notice))
        .route("/push/new-insight", post(push_new_insight))
        .route("/logout", post(logout))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn status_for(e: DashboardError) -> StatusCode {
    debug!(error = %e, "dashboard action refused");
    match e {
        DashboardError::Unmounted => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::MalformedDraft(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DashboardError::TransientFetch { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn get_view(State(state): State<AppState>) -> Json<ViewModel> {
    Json(state.dashboard.view())
}

async fn put_draft(
    State(state): State<AppState>,
    Json(draft): Json<CompetitorDraft>,
) -> Result<StatusCode, StatusCode> {
    state.dashboard.update_draft(draft).await.map_err(status_for)?;
    Ok(StatusCode::ACCEPTED)
}

/// A non-empty body replaces the draft before submitting; an invalid one is
/// answered with 422 (the field error is also on the view-model).
async fn submit_competitor(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    if body.iter().all(u8::is_ascii_whitespace) {
        state
            .dashboard
            .submit_new_competitor()
            .await
            .map_err(status_for)?;
    } else {
        let draft: CompetitorDraft =
            serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
        state.dashboard.submit_draft(draft).await.map_err(status_for)?;
    }
    Ok(StatusCode::ACCEPTED)
}

async fn select_competitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .dashboard
        .select_competitor(CompetitorId::new(id))
        .await
        .map_err(status_for)?;
    Ok(StatusCode::ACCEPTED)
}

async fn dismiss_notice(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, StatusCode> {
    state.dashboard.dismiss_notice(id).await.map_err(status_for)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Serialize)]
struct PushAck {
    delivered: usize,
}

async fn push_new_insight(
    State(state): State<AppState>,
    Json(record): Json<PushRecord>,
) -> (StatusCode, Json<PushAck>) {
    let delivered = state.hub.publish(NEW_INSIGHT_TOPIC, record);
    debug!(delivered, "push ingress");
    (StatusCode::ACCEPTED, Json(PushAck { delivered }))
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    let _ = state.dashboard.logout().await;
    StatusCode::NO_CONTENT
}
