// tests/subscription_lifecycle.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use common::{competitor, insight, mount, mount_with, push, ready, until};
use competitor_insights::api::MockApi;
use competitor_insights::push::PushSubscription;
use competitor_insights::view::NoticeKind;
use competitor_insights::{
    ControllerConfig, DashboardController, DashboardError, DashboardHandle, LocalPushHub,
    PushChannel, Session, NEW_INSIGHT_TOPIC,
};

#[tokio::test]
async fn mount_subscribes_once_and_logout_releases() {
    let api = Arc::new(MockApi::new());
    let hub = LocalPushHub::default();
    let dash = mount(&api, &hub);
    ready(&dash).await;
    assert_eq!(hub.subscriber_count(NEW_INSIGHT_TOPIC), 1);

    dash.logout().await.unwrap();
    assert_eq!(hub.subscriber_count(NEW_INSIGHT_TOPIC), 0);
    assert!(!dash.is_mounted());

    // second logout is a no-op, later actions report the unmount
    dash.logout().await.unwrap();
    assert!(matches!(
        dash.select_competitor("a".into()).await,
        Err(DashboardError::Unmounted)
    ));
}

#[tokio::test]
async fn concurrent_logouts_both_wait_for_teardown() {
    let api = Arc::new(MockApi::new());
    let hub = LocalPushHub::default();
    let dash = mount(&api, &hub);
    ready(&dash).await;

    // each caller samples the hub as soon as its own logout returns
    let logout_then_count = |handle: DashboardHandle| {
        let hub = hub.clone();
        async move {
            handle.logout().await.unwrap();
            hub.subscriber_count(NEW_INSIGHT_TOPIC)
        }
    };
    let (first, second) = tokio::join!(logout_then_count(dash.clone()), logout_then_count(dash));
    assert_eq!((first, second), (0, 0));
}

#[tokio::test]
async fn dropping_every_handle_unmounts() {
    let api = Arc::new(MockApi::new());
    let hub = LocalPushHub::default();
    let dash = mount(&api, &hub);
    ready(&dash).await;
    let extra = dash.clone();
    drop(dash);
    assert_eq!(hub.subscriber_count(NEW_INSIGHT_TOPIC), 1);
    drop(extra);

    tokio::time::timeout(Duration::from_secs(3), async {
        while hub.subscriber_count(NEW_INSIGHT_TOPIC) != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription should be released");
}

#[tokio::test]
async fn pushes_after_logout_reach_nobody() {
    let api = Arc::new(MockApi::new().with_competitors(vec![competitor("a", "Acme")]));
    let hub = LocalPushHub::default();
    let dash = mount(&api, &hub);
    ready(&dash).await;
    dash.select_competitor("a".into()).await.unwrap();
    until(&dash, |vm| vm.focused_competitor_id.is_some()).await;

    assert_eq!(hub.publish(NEW_INSIGHT_TOPIC, push("a", insight(Some("n1"), 4, "live"))), 1);
    let vm = until(&dash, |vm| vm.total_insights == 1).await;
    assert_eq!(vm.insights[0].key, "n1");

    dash.logout().await.unwrap();
    assert_eq!(hub.publish(NEW_INSIGHT_TOPIC, push("a", insight(Some("n2"), 5, "late"))), 0);
    assert_eq!(dash.view().total_insights, 1);
}

struct BrokenPush;

#[async_trait]
impl PushChannel for BrokenPush {
    async fn subscribe(&self, _topic: &str) -> anyhow::Result<PushSubscription> {
        Err(anyhow!("socket refused"))
    }
}

#[tokio::test]
async fn subscription_failure_degrades_to_notice() {
    let api = Arc::new(MockApi::new().with_competitors(vec![competitor("a", "Acme")]));
    let session = Session::new(api.clone(), Arc::new(BrokenPush));
    let dash = DashboardController::mount(session, ControllerConfig::default());

    let vm = ready(&dash).await;
    assert!(!vm.live_updates);
    assert_eq!(vm.competitors.len(), 1, "fetching still works");
    assert_eq!(vm.notices.len(), 1);
    assert_eq!(vm.notices[0].kind, NoticeKind::LiveUpdatesUnavailable);
    dash.logout().await.unwrap();
}

#[tokio::test]
async fn polling_refreshes_the_focused_competitor() {
    let api = Arc::new(MockApi::new().with_competitors(vec![competitor("a", "Acme")]));
    api.set_insights(&"a".into(), vec![insight(Some("a1"), 1, "first")]);
    let cfg = ControllerConfig {
        refresh_interval: Some(Duration::from_millis(20)),
        ..ControllerConfig::default()
    };
    let dash = mount_with(&api, &LocalPushHub::default(), cfg);
    ready(&dash).await;

    dash.select_competitor("a".into()).await.unwrap();
    until(&dash, |vm| vm.total_insights == 1).await;

    api.set_insights(
        &"a".into(),
        vec![insight(Some("a1"), 1, "first"), insight(Some("a2"), 2, "second")],
    );
    let vm = until(&dash, |vm| vm.total_insights == 2).await;
    assert_eq!(vm.insights[0].key, "a2");
    assert!(api.calls().list_insights.len() >= 2);
    dash.logout().await.unwrap();
}
