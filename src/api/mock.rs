// src/api/mock.rs
//! In-memory competitor service for tests, demos and local runs.
//!
//! Supports scripted data, one-shot failure injection, release gates (a call
//! parks until the test releases it, which lets callers reorder completions)
//! and call counting.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use super::CompetitorApi;
use crate::model::{Competitor, CompetitorId, Insight, NewCompetitor};

/// Which call a gate or an injected failure applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockCall {
    ListCompetitors,
    CreateCompetitor,
    ListInsights(CompetitorId),
}

/// Held call; dropping it also releases.
#[derive(Debug)]
pub struct Gate(Option<oneshot::Sender<()>>);

impl Gate {
    pub fn release(mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// Calls observed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub list_competitors: usize,
    pub create_competitor: usize,
    pub list_insights: Vec<CompetitorId>,
}

#[derive(Default)]
struct MockState {
    competitors: Vec<Competitor>,
    insights: HashMap<CompetitorId, Vec<Insight>>,
    failures: HashMap<MockCall, usize>,
    gates: HashMap<MockCall, VecDeque<oneshot::Receiver<()>>>,
    calls: MockCalls,
    next_id: u64,
}

#[derive(Default)]
pub struct MockApi {
    inner: Mutex<MockState>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_competitors(self, competitors: Vec<Competitor>) -> Self {
        self.lock().competitors = competitors;
        self
    }

    pub fn set_insights(&self, competitor_id: &CompetitorId, insights: Vec<Insight>) {
        self.lock().insights.insert(competitor_id.clone(), insights);
    }

    pub fn competitors(&self) -> Vec<Competitor> {
        self.lock().competitors.clone()
    }

    /// Next matching call fails.
    pub fn fail_next(&self, call: MockCall) {
        *self.lock().failures.entry(call).or_insert(0) += 1;
    }

    /// Next matching call parks until the returned gate is released.
    pub fn hold_next(&self, call: MockCall) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.entry(call).or_default().push_back(rx);
        Gate(Some(tx))
    }

    pub fn calls(&self) -> MockCalls {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().expect("mock api mutex poisoned")
    }

    /// Records the call, waits on its gate (if any), then reports whether it should fail.
    async fn enter(&self, call: MockCall) -> Result<()> {
        let gate = {
            let mut st = self.lock();
            match &call {
                MockCall::ListCompetitors => st.calls.list_competitors += 1,
                MockCall::CreateCompetitor => st.calls.create_competitor += 1,
                MockCall::ListInsights(id) => st.calls.list_insights.push(id.clone()),
            }
            st.gates.get_mut(&call).and_then(|q| q.pop_front())
        };
        if let Some(rx) = gate {
            let _ = rx.await;
        }

        let mut st = self.lock();
        if let Some(n) = st.failures.get_mut(&call) {
            if *n > 0 {
                *n -= 1;
                return Err(anyhow!("mock failure for {call:?}"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CompetitorApi for MockApi {
    async fn list_competitors(&self) -> Result<Vec<Competitor>> {
        self.enter(MockCall::ListCompetitors).await?;
        Ok(self.lock().competitors.clone())
    }

    async fn create_competitor(&self, draft: &NewCompetitor) -> Result<Competitor> {
        self.enter(MockCall::CreateCompetitor).await?;
        let mut st = self.lock();
        st.next_id += 1;
        let created = Competitor {
            id: CompetitorId::new(format!("mock-{}", st.next_id)),
            name: draft.name.clone(),
            website: draft.website.clone(),
            twitter: draft.twitter.clone(),
        };
        st.competitors.push(created.clone());
        Ok(created)
    }

    async fn list_insights(&self, competitor_id: &CompetitorId) -> Result<Vec<Insight>> {
        self.enter(MockCall::ListInsights(competitor_id.clone())).await?;
        Ok(self
            .lock()
            .insights
            .get(competitor_id)
            .cloned()
            .unwrap_or_default())
    }
}
