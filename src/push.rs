// src/push.rs
//! Push channel contract, an in-process hub, and the reconciler that merges
//! pushed insights into the focused selection.
//!
//! A subscription is a lease: it is released exactly once, when the
//! `PushSubscription` is dropped, whichever way its owner exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::model::PushRecord;
use crate::selection::{AppendOutcome, SelectionState};

/// Topic carrying freshly produced insights.
pub const NEW_INSIGHT_TOPIC: &str = "new-insight";

/// Server-to-client stream of already-parsed records.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<PushSubscription>;
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Serial delivery of one topic. Unsubscribes on drop.
pub struct PushSubscription {
    topic: String,
    rx: mpsc::Receiver<PushRecord>,
    release: Option<Release>,
}

impl PushSubscription {
    pub fn new(
        topic: impl Into<String>,
        rx: mpsc::Receiver<PushRecord>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            topic: topic.into(),
            rx,
            release: Some(Box::new(release)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next record in delivery order; `None` once the channel side is gone.
    pub async fn recv(&mut self) -> Option<PushRecord> {
        self.rx.recv().await
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            info!(topic = %self.topic, "push subscription released");
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<PushRecord>,
}

#[derive(Default)]
struct HubInner {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

/// In-process push channel. Publishing fans out to every live subscriber of
/// the topic; a full subscriber buffer drops the record (delivery gaps are tolerated).
#[derive(Clone)]
pub struct LocalPushHub {
    inner: Arc<HubInner>,
    buffer: usize,
}

impl LocalPushHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner::default()),
            buffer: buffer.max(1),
        }
    }

    /// Returns how many subscribers received the record.
    pub fn publish(&self, topic: &str, record: PushRecord) -> usize {
        let mut topics = self.inner.topics.lock().expect("push hub mutex poisoned");
        let Some(subs) = topics.get_mut(topic) else {
            debug!(topic, "publish without subscribers");
            return 0;
        };

        let mut delivered = 0;
        subs.retain(|s| match s.tx.try_send(record.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(topic, subscriber = s.id, "push subscriber lagging; record dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .expect("push hub mutex poisoned")
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl Default for LocalPushHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl PushChannel for LocalPushHub {
    async fn subscribe(&self, topic: &str) -> Result<PushSubscription> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .lock()
            .expect("push hub mutex poisoned")
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });

        let inner = Arc::clone(&self.inner);
        let key = topic.to_string();
        info!(topic, subscriber = id, "push subscription opened");
        Ok(PushSubscription::new(topic, rx, move || {
            if let Ok(mut topics) = inner.topics.lock() {
                if let Some(subs) = topics.get_mut(&key) {
                    subs.retain(|s| s.id != id);
                    if subs.is_empty() {
                        topics.remove(&key);
                    }
                }
            }
        }))
    }
}

/// What happened to one pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Appended,
    DuplicateIgnored,
    /// Record targets a competitor other than the focus; selection untouched.
    NotFocused,
}

/// Merges pushed insights into the focused sequence, idempotently.
#[derive(Debug, Default)]
pub struct PushReconciler {
    received: u64,
}

impl PushReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn apply(&mut self, selection: &mut SelectionState, record: PushRecord) -> PushOutcome {
        self.received += 1;
        counter!("dashboard_push_received_total").increment(1);

        if !selection.is_focused(&record.competitor_id) {
            counter!("dashboard_push_unfocused_total").increment(1);
            debug!(competitor_id = %record.competitor_id, "push for unfocused competitor dropped");
            return PushOutcome::NotFocused;
        }

        match selection.append(record.insight) {
            AppendOutcome::Appended => PushOutcome::Appended,
            AppendOutcome::Duplicate => {
                counter!("dashboard_push_duplicates_total").increment(1);
                debug!(competitor_id = %record.competitor_id, "duplicate pushed insight ignored");
                PushOutcome::DuplicateIgnored
            }
        }
    }
}
