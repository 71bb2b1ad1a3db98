// src/controller.rs
//! # Dashboard Controller
//! Owns the dashboard state and is its only writer. Runs as one task: user
//! commands, fetch completions, push records and refresh ticks are processed
//! one at a time, and every transition publishes a fresh [`ViewModel`].
//!
//! Lifecycle: [`DashboardController::mount`] subscribes to the push topic and
//! loads competitors; the subscription lives on the task's stack and is
//! released when the task ends (logout, all handles dropped, or the runtime
//! shutting down).

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::api::CompetitorApi;
use crate::error::{DashboardError, DraftError, FetchOp};
use crate::fetch::{Completion, Dispatch, FetchCoordinator, InsightsFreshness};
use crate::metrics::ensure_metrics_described;
use crate::model::{CompetitorDraft, CompetitorId, PushRecord};
use crate::push::{PushChannel, PushOutcome, PushReconciler, PushSubscription, NEW_INSIGHT_TOPIC};
use crate::selection::{CompetitorList, SelectionState};
use crate::view::{Diagnostics, InsightCard, NoticeKind, Notices, ViewModel};

/// Explicit session context: the collaborators one authenticated session talks to.
#[derive(Clone)]
pub struct Session {
    pub api: Arc<dyn CompetitorApi>,
    pub push: Arc<dyn PushChannel>,
}

impl Session {
    pub fn new(api: Arc<dyn CompetitorApi>, push: Arc<dyn PushChannel>) -> Self {
        Self { api, push }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub recent_insights_limit: usize,
    /// Re-fetch the focused competitor's insights this often.
    pub refresh_interval: Option<Duration>,
    pub notice_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            recent_insights_limit: 6,
            refresh_interval: None,
            notice_limit: 5,
        }
    }
}

#[derive(Debug)]
enum Command {
    UpdateDraft(CompetitorDraft),
    SubmitNewCompetitor,
    SelectCompetitor(CompetitorId),
    DismissNotice(u64),
    Logout,
}

/// Cloneable front door to a mounted dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ViewModel>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DashboardHandle {
    /// Latest published snapshot.
    pub fn view(&self) -> ViewModel {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view.clone()
    }

    /// Waits for the first snapshot satisfying `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&ViewModel) -> bool,
    ) -> Result<ViewModel, DashboardError> {
        let mut rx = self.view.clone();
        let vm = rx
            .wait_for(pred)
            .await
            .map_err(|_| DashboardError::Unmounted)?;
        Ok(vm.clone())
    }

    pub async fn update_draft(&self, draft: CompetitorDraft) -> Result<(), DashboardError> {
        self.send(Command::UpdateDraft(draft)).await
    }

    /// Submits the current draft.
    pub async fn submit_new_competitor(&self) -> Result<(), DashboardError> {
        self.send(Command::SubmitNewCompetitor).await
    }

    /// Replaces the draft and submits it. A draft that fails validation is
    /// still recorded, so the view carries the field error, and is reported back.
    pub async fn submit_draft(&self, draft: CompetitorDraft) -> Result<(), DashboardError> {
        let checked = draft.validate();
        self.send(Command::UpdateDraft(draft)).await?;
        self.send(Command::SubmitNewCompetitor).await?;
        checked.map(|_| ()).map_err(DashboardError::from)
    }

    pub async fn select_competitor(&self, id: CompetitorId) -> Result<(), DashboardError> {
        self.send(Command::SelectCompetitor(id)).await
    }

    pub async fn dismiss_notice(&self, id: u64) -> Result<(), DashboardError> {
        self.send(Command::DismissNotice(id)).await
    }

    /// Ends the session and waits for teardown (push subscription released).
    /// Concurrent callers all return after teardown; later calls are no-ops.
    pub async fn logout(&self) -> Result<(), DashboardError> {
        let _ = self.commands.send(Command::Logout).await;
        // held across the join so a second caller waits for the first
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "dashboard task ended abnormally");
            }
        }
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn send(&self, cmd: Command) -> Result<(), DashboardError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| DashboardError::Unmounted)
    }
}

pub struct DashboardController {
    config: ControllerConfig,
    session: Session,
    fetch: FetchCoordinator,
    competitors: CompetitorList,
    selection: SelectionState,
    reconciler: PushReconciler,
    draft: CompetitorDraft,
    draft_error: Option<DraftError>,
    notices: Notices,
    diagnostics: Diagnostics,
    live_updates: bool,
    revision: u64,
    view_tx: watch::Sender<ViewModel>,
}

impl DashboardController {
    /// Spawns the controller task. Must be called inside a Tokio runtime.
    pub fn mount(session: Session, config: ControllerConfig) -> DashboardHandle {
        ensure_metrics_described();
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (view_tx, view_rx) = watch::channel(ViewModel::initial());

        let controller = Self {
            fetch: FetchCoordinator::new(Arc::clone(&session.api)),
            notices: Notices::new(config.notice_limit),
            config,
            session,
            competitors: CompetitorList::new(),
            selection: SelectionState::new(),
            reconciler: PushReconciler::new(),
            draft: CompetitorDraft::default(),
            draft_error: None,
            diagnostics: Diagnostics::default(),
            live_updates: false,
            revision: 0,
            view_tx,
        };
        let task = tokio::spawn(controller.run(cmd_rx));

        DashboardHandle {
            commands: cmd_tx,
            view: view_rx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut subscription = match self.session.push.subscribe(NEW_INSIGHT_TOPIC).await {
            Ok(sub) => {
                self.live_updates = true;
                Some(sub)
            }
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "push subscription failed; continuing without live updates"
                );
                self.notices.raise(
                    NoticeKind::LiveUpdatesUnavailable,
                    "Live updates are unavailable",
                );
                None
            }
        };

        self.fetch.load_competitors();
        self.publish();
        info!(live_updates = self.live_updates, "dashboard mounted");

        let mut refresh = self.config.refresh_interval.map(|period| {
            let mut iv = time::interval_at(time::Instant::now() + period, period);
            iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
            iv
        });

        loop {
            let changed = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Logout) | None => break,
                    Some(cmd) => self.on_command(cmd),
                },
                Some(done) = self.fetch.next_completion() => self.on_completion(done),
                record = next_push(&mut subscription) => match record {
                    Some(record) => self.on_push(record),
                    None => {
                        warn!("push channel closed; live updates stopped");
                        subscription = None;
                        self.live_updates = false;
                        true
                    }
                },
                _ = next_tick(&mut refresh) => self.on_refresh_tick(),
            };
            if changed {
                self.publish();
            }
        }

        drop(subscription);
        info!("dashboard unmounted");
    }

    fn on_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::UpdateDraft(draft) => {
                self.draft = draft;
                self.draft_error = None;
                true
            }
            Command::SubmitNewCompetitor => self.submit_draft(),
            Command::SelectCompetitor(id) => self.select(id),
            Command::DismissNotice(id) => self.notices.dismiss(id),
            // handled by the loop
            Command::Logout => false,
        }
    }

    /// Only listed competitors can take the focus.
    fn select(&mut self, id: CompetitorId) -> bool {
        if self.competitors.get(&id).is_none() {
            debug!(competitor_id = %id, "select ignored: unknown competitor");
            return false;
        }
        self.fetch.load_insights_for(id) == Dispatch::Started
    }

    fn submit_draft(&mut self) -> bool {
        if self.fetch.adding_competitor() {
            debug!("submit ignored: create already in flight");
            return false;
        }
        match self.draft.validate() {
            Ok(new) => {
                self.draft_error = None;
                self.fetch.create_competitor(new);
            }
            Err(e) => {
                counter!("dashboard_draft_rejected_total").increment(1);
                debug!(error = %e, "draft rejected");
                self.draft_error = Some(e);
            }
        }
        true
    }

    fn on_completion(&mut self, done: Completion) -> bool {
        match done {
            Completion::Competitors(result) => {
                self.fetch.settle_competitors();
                match result {
                    Ok(list) => {
                        let retained = self.competitors.sync(list);
                        if !retained.is_empty() {
                            debug!(?retained, "competitors missing from response kept");
                        }
                        gauge!("dashboard_competitors").set(self.competitors.len() as f64);
                    }
                    Err(e) => self.fetch_failed(FetchOp::ListCompetitors, &e),
                }
            }
            Completion::Created(result) => match result {
                Ok(created) => {
                    info!(competitor_id = %created.id, name = %created.name, "competitor created");
                    self.draft = CompetitorDraft::default();
                    self.fetch.resync_competitors();
                    self.fetch.settle_create();
                }
                Err(e) => {
                    self.fetch.settle_create();
                    self.fetch_failed(FetchOp::CreateCompetitor, &e);
                }
            },
            Completion::Insights {
                ticket,
                competitor_id,
                result,
            } => match self.fetch.settle_insights(ticket) {
                InsightsFreshness::Stale => {
                    counter!("dashboard_stale_results_total").increment(1);
                    debug!(
                        %competitor_id,
                        ticket = ticket.value(),
                        "stale insight result discarded"
                    );
                    self.diagnostics.stale_results_discarded += 1;
                }
                InsightsFreshness::Current => match result {
                    Ok(list) => {
                        let dropped = self.selection.replace(competitor_id.clone(), list);
                        if dropped > 0 {
                            debug!(%competitor_id, dropped, "repeated insight ids in response");
                        }
                        info!(%competitor_id, insights = self.selection.len(), "focus updated");
                    }
                    Err(e) => self.fetch_failed(FetchOp::ListInsights, &e),
                },
            },
        }
        true
    }

    fn fetch_failed(&mut self, op: FetchOp, err: &anyhow::Error) {
        counter!("dashboard_fetch_errors_total", "op" => op.as_str()).increment(1);
        let e = DashboardError::transient(op, err);
        warn!(error = %e, "collaborator call failed; keeping previous state");
        self.notices
            .raise(NoticeKind::FetchFailed(op), op.user_message());
    }

    fn on_push(&mut self, record: PushRecord) -> bool {
        match self.reconciler.apply(&mut self.selection, record) {
            PushOutcome::Appended => {}
            PushOutcome::DuplicateIgnored => self.diagnostics.duplicate_pushes_ignored += 1,
            PushOutcome::NotFocused => self.diagnostics.unfocused_pushes_dropped += 1,
        }
        true
    }

    fn on_refresh_tick(&mut self) -> bool {
        if self.fetch.pending_insights().is_some() {
            return false;
        }
        match self.selection.focus().cloned() {
            Some(focus) => {
                debug!(competitor_id = %focus, "polling insights");
                self.fetch.load_insights_for(focus) == Dispatch::Started
            }
            None => false,
        }
    }

    fn snapshot(&self) -> ViewModel {
        let focus = self.selection.focus().cloned();
        let focused_competitor_name = focus
            .as_ref()
            .and_then(|id| self.competitors.get(id))
            .map(|c| c.name.clone());

        ViewModel {
            revision: self.revision,
            competitors: self.competitors.as_slice().to_vec(),
            loading_competitors: self.fetch.loading_competitors(),
            adding_competitor: self.fetch.adding_competitor(),
            draft: self.draft.clone(),
            draft_error: self.draft_error.clone(),
            focused_competitor_id: focus,
            focused_competitor_name,
            loading_insights_for: self.fetch.pending_insights().cloned(),
            insights: self
                .selection
                .recent(self.config.recent_insights_limit)
                .map(InsightCard::from)
                .collect(),
            total_insights: self.selection.len(),
            chart_series: aggregate(self.selection.insights()),
            notices: self.notices.as_slice().to_vec(),
            diagnostics: self.diagnostics,
            live_updates: self.live_updates,
        }
    }

    fn publish(&mut self) {
        self.revision += 1;
        let vm = self.snapshot();
        self.view_tx.send_replace(vm);
    }
}

async fn next_push(sub: &mut Option<PushSubscription>) -> Option<PushRecord> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(iv: &mut Option<Interval>) {
    match iv {
        Some(iv) => {
            iv.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
