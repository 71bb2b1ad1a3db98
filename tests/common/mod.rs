// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use competitor_insights::api::MockApi;
use competitor_insights::{
    Competitor, ControllerConfig, DashboardController, DashboardHandle, Insight, InsightId,
    LocalPushHub, PushRecord, Session, ViewModel,
};

pub fn competitor(id: &str, name: &str) -> Competitor {
    Competitor {
        id: id.into(),
        name: name.to_string(),
        website: format!("https://{}.example", name.to_lowercase()),
        twitter: None,
    }
}

pub fn insight(id: Option<&str>, day: u32, summary: &str) -> Insight {
    Insight {
        id: id.map(InsightId::new),
        competitor_id: None,
        date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        summary: summary.to_string(),
        category: None,
    }
}

pub fn push(competitor_id: &str, ins: Insight) -> PushRecord {
    PushRecord {
        competitor_id: competitor_id.into(),
        insight: ins,
    }
}

pub fn mount(api: &Arc<MockApi>, hub: &LocalPushHub) -> DashboardHandle {
    mount_with(api, hub, ControllerConfig::default())
}

pub fn mount_with(
    api: &Arc<MockApi>,
    hub: &LocalPushHub,
    cfg: ControllerConfig,
) -> DashboardHandle {
    let session = Session::new(api.clone(), Arc::new(hub.clone()));
    DashboardController::mount(session, cfg)
}

/// Waits (bounded) for a snapshot matching `pred`.
pub async fn until(
    handle: &DashboardHandle,
    pred: impl FnMut(&ViewModel) -> bool,
) -> ViewModel {
    tokio::time::timeout(Duration::from_secs(3), handle.wait_for(pred))
        .await
        .expect("timed out waiting for dashboard state")
        .expect("dashboard unmounted")
}

/// Waits until the controller is mounted, loaded and subscribed.
pub async fn ready(handle: &DashboardHandle) -> ViewModel {
    until(handle, |vm| vm.revision > 0 && !vm.loading_competitors).await
}
