// src/fetch.rs
//! # Fetch Coordinator
//! Brokers request/response calls to the competitor service and tracks their
//! overlap:
//!
//! - competitor list: one request at a time; a plain reload joins the one in
//!   flight, a resync (after a create) is queued behind it;
//! - create: at most one outstanding; re-entrant submits are rejected;
//! - insights: every call gets a ticket; only the latest ticket may land.
//!
//! Calls run as detached tasks and post a [`Completion`] back to the owning
//! controller. A drop guard posts a failed completion if a task dies before
//! answering, so in-flight flags always clear.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::CompetitorApi;
use crate::model::{Competitor, CompetitorId, Insight, NewCompetitor};

/// Staleness token for insight loads; strictly increasing per coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// A finished collaborator call, delivered on the controller's context.
#[derive(Debug)]
pub enum Completion {
    Competitors(anyhow::Result<Vec<Competitor>>),
    Created(anyhow::Result<Competitor>),
    Insights {
        ticket: Ticket,
        competitor_id: CompetitorId,
        result: anyhow::Result<Vec<Insight>>,
    },
}

/// How a request for work was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    /// An equivalent request is already in flight; its result will serve.
    Joined,
    /// Queued behind the in-flight request.
    Queued,
    /// Refused (e.g. a create while another is outstanding).
    Rejected,
}

/// Whether a settled insight load may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightsFreshness {
    Current,
    /// Superseded by a newer call; the result must be dropped.
    Stale,
}

/// Posts `abandoned` unless `complete` was called first.
struct InFlight {
    tx: mpsc::UnboundedSender<Completion>,
    abandoned: Option<Completion>,
}

impl InFlight {
    fn new(tx: mpsc::UnboundedSender<Completion>, abandoned: Completion) -> Self {
        Self {
            tx,
            abandoned: Some(abandoned),
        }
    }

    fn complete(mut self, done: Completion) {
        self.abandoned = None;
        let _ = self.tx.send(done);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(done) = self.abandoned.take() {
            let _ = self.tx.send(done);
        }
    }
}

pub struct FetchCoordinator {
    api: Arc<dyn CompetitorApi>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    loading_competitors: bool,
    resync_queued: bool,
    adding_competitor: bool,
    latest_ticket: Ticket,
    pending_insights: Option<(Ticket, CompetitorId)>,
}

impl FetchCoordinator {
    pub fn new(api: Arc<dyn CompetitorApi>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            tx,
            rx,
            loading_competitors: false,
            resync_queued: false,
            adding_competitor: false,
            latest_ticket: Ticket(0),
            pending_insights: None,
        }
    }

    pub fn loading_competitors(&self) -> bool {
        self.loading_competitors
    }

    pub fn adding_competitor(&self) -> bool {
        self.adding_competitor
    }

    /// Target of the latest insight load still in flight.
    pub fn pending_insights(&self) -> Option<&CompetitorId> {
        self.pending_insights.as_ref().map(|(_, id)| id)
    }

    /// Next finished call. Never yields `None` while the coordinator lives.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Fetch the full list; joins a load already in flight.
    pub fn load_competitors(&mut self) -> Dispatch {
        if self.loading_competitors {
            return Dispatch::Joined;
        }
        self.spawn_list();
        Dispatch::Started
    }

    /// Fetch the list strictly after now: queued if a load is already running.
    pub fn resync_competitors(&mut self) -> Dispatch {
        if self.loading_competitors {
            self.resync_queued = true;
            return Dispatch::Queued;
        }
        self.spawn_list();
        Dispatch::Started
    }

    /// Marks the list load finished, starting the queued resync if any.
    /// Returns `true` while another load remains in flight.
    pub fn settle_competitors(&mut self) -> bool {
        self.loading_competitors = false;
        if std::mem::take(&mut self.resync_queued) {
            debug!("starting queued competitor resync");
            self.spawn_list();
        }
        self.loading_competitors
    }

    pub fn create_competitor(&mut self, draft: NewCompetitor) -> Dispatch {
        if self.adding_competitor {
            debug!(name = %draft.name, "create already in flight; submit rejected");
            return Dispatch::Rejected;
        }
        self.adding_competitor = true;

        let api = Arc::clone(&self.api);
        let guard = InFlight::new(
            self.tx.clone(),
            Completion::Created(Err(anyhow!("create request abandoned"))),
        );
        info!(name = %draft.name, "creating competitor");
        tokio::spawn(async move {
            let result = api.create_competitor(&draft).await;
            guard.complete(Completion::Created(result));
        });
        Dispatch::Started
    }

    pub fn settle_create(&mut self) {
        self.adding_competitor = false;
    }

    /// Issue an insight load. Every started call supersedes all earlier ones.
    pub fn load_insights_for(&mut self, competitor_id: CompetitorId) -> Dispatch {
        if self.pending_insights() == Some(&competitor_id) {
            return Dispatch::Joined;
        }

        self.latest_ticket = Ticket(self.latest_ticket.0 + 1);
        let ticket = self.latest_ticket;
        self.pending_insights = Some((ticket, competitor_id.clone()));

        let api = Arc::clone(&self.api);
        let guard = InFlight::new(
            self.tx.clone(),
            Completion::Insights {
                ticket,
                competitor_id: competitor_id.clone(),
                result: Err(anyhow!("insight request abandoned")),
            },
        );
        debug!(competitor_id = %competitor_id, ticket = ticket.0, "loading insights");
        tokio::spawn(async move {
            let result = api.list_insights(&competitor_id).await;
            guard.complete(Completion::Insights {
                ticket,
                competitor_id,
                result,
            });
        });
        Dispatch::Started
    }

    /// Decide whether a finished insight load is still the latest one.
    pub fn settle_insights(&mut self, ticket: Ticket) -> InsightsFreshness {
        if ticket != self.latest_ticket {
            return InsightsFreshness::Stale;
        }
        self.pending_insights = None;
        InsightsFreshness::Current
    }

    fn spawn_list(&mut self) {
        self.loading_competitors = true;
        let api = Arc::clone(&self.api);
        let guard = InFlight::new(
            self.tx.clone(),
            Completion::Competitors(Err(anyhow!("competitor list request abandoned"))),
        );
        tokio::spawn(async move {
            let result = api.list_competitors().await;
            guard.complete(Completion::Competitors(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockApi, MockCall};
    use async_trait::async_trait;

    fn coordinator(api: Arc<MockApi>) -> FetchCoordinator {
        FetchCoordinator::new(api)
    }

    #[tokio::test]
    async fn list_load_joins_while_in_flight() {
        let api = Arc::new(MockApi::new());
        let gate = api.hold_next(MockCall::ListCompetitors);
        let mut f = coordinator(api.clone());

        assert_eq!(f.load_competitors(), Dispatch::Started);
        assert_eq!(f.load_competitors(), Dispatch::Joined);
        assert!(f.loading_competitors());
        gate.release();

        let done = f.next_completion().await.unwrap();
        assert!(matches!(done, Completion::Competitors(Ok(_))));
        assert!(!f.settle_competitors());
        assert!(!f.loading_competitors());
        assert_eq!(api.calls().list_competitors, 1);
    }

    #[tokio::test]
    async fn resync_is_queued_behind_running_load() {
        let api = Arc::new(MockApi::new());
        let gate = api.hold_next(MockCall::ListCompetitors);
        let mut f = coordinator(api.clone());

        f.load_competitors();
        assert_eq!(f.resync_competitors(), Dispatch::Queued);
        gate.release();

        let _ = f.next_completion().await.unwrap();
        assert!(f.settle_competitors(), "queued resync should start");
        let _ = f.next_completion().await.unwrap();
        assert!(!f.settle_competitors());
        assert_eq!(api.calls().list_competitors, 2);
    }

    #[tokio::test]
    async fn second_create_is_rejected_until_settled() {
        let api = Arc::new(MockApi::new());
        let gate = api.hold_next(MockCall::CreateCompetitor);
        let mut f = coordinator(api.clone());
        let draft = NewCompetitor {
            name: "Acme".into(),
            website: "https://acme.com".into(),
            twitter: None,
        };

        assert_eq!(f.create_competitor(draft.clone()), Dispatch::Started);
        assert_eq!(f.create_competitor(draft.clone()), Dispatch::Rejected);
        gate.release();
        assert!(matches!(f.next_completion().await, Some(Completion::Created(Ok(_)))));
        f.settle_create();
        assert!(!f.adding_competitor());
        assert_eq!(api.calls().create_competitor, 1);
    }

    #[tokio::test]
    async fn only_latest_ticket_is_current() {
        let api = Arc::new(MockApi::new());
        let gate_a = api.hold_next(MockCall::ListInsights("a".into()));
        let mut f = coordinator(api.clone());

        f.load_insights_for("a".into());
        f.load_insights_for("b".into());
        assert_eq!(f.pending_insights(), Some(&CompetitorId::from("b")));

        let Some(Completion::Insights { ticket, competitor_id, .. }) = f.next_completion().await
        else {
            panic!("expected insights completion");
        };
        assert_eq!(competitor_id.as_str(), "b");
        assert_eq!(f.settle_insights(ticket), InsightsFreshness::Current);

        gate_a.release();
        let Some(Completion::Insights { ticket, competitor_id, .. }) = f.next_completion().await
        else {
            panic!("expected insights completion");
        };
        assert_eq!(competitor_id.as_str(), "a");
        assert_eq!(f.settle_insights(ticket), InsightsFreshness::Stale);
        assert!(f.pending_insights().is_none());
    }

    #[tokio::test]
    async fn reselecting_pending_target_joins() {
        let api = Arc::new(MockApi::new());
        let gate = api.hold_next(MockCall::ListInsights("a".into()));
        let mut f = coordinator(api.clone());
        assert_eq!(f.load_insights_for("a".into()), Dispatch::Started);
        assert_eq!(f.load_insights_for("a".into()), Dispatch::Joined);
        gate.release();
        let _ = f.next_completion().await;
        assert_eq!(api.calls().list_insights.len(), 1);
    }

    struct PanickingApi;

    #[async_trait]
    impl CompetitorApi for PanickingApi {
        async fn list_competitors(&self) -> anyhow::Result<Vec<Competitor>> {
            panic!("collaborator blew up");
        }
        async fn create_competitor(&self, _draft: &NewCompetitor) -> anyhow::Result<Competitor> {
            panic!("collaborator blew up");
        }
        async fn list_insights(&self, _id: &CompetitorId) -> anyhow::Result<Vec<Insight>> {
            panic!("collaborator blew up");
        }
    }

    #[tokio::test]
    async fn panicking_call_still_completes_as_failure() {
        let mut f = FetchCoordinator::new(Arc::new(PanickingApi));
        f.load_competitors();
        let done = f.next_completion().await.unwrap();
        assert!(matches!(done, Completion::Competitors(Err(_))));
        f.settle_competitors();
        assert!(!f.loading_competitors());
    }
}
