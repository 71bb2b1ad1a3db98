// src/view.rs
//! Immutable snapshot handed to presentation after every state transition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::day_label;
use crate::error::{DraftError, FetchOp};
use crate::model::{Competitor, CompetitorDraft, CompetitorId, Insight, TimeSeries};

/// Which affordance the competitor list should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListState {
    Loading,
    Empty,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartState {
    NoData,
    Series,
}

/// Presentation form of one insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightCard {
    /// Insight id, or its timestamp when the record has none.
    pub key: String,
    pub date_label: String,
    pub category: String,
    pub summary: String,
}

impl From<&Insight> for InsightCard {
    fn from(ins: &Insight) -> Self {
        Self {
            key: ins
                .identity()
                .map(|id| id.as_str().to_string())
                .unwrap_or_else(|| ins.date.to_rfc3339()),
            date_label: day_label(&ins.date),
            category: ins.category().to_string(),
            summary: ins.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "op", rename_all = "snake_case")]
pub enum NoticeKind {
    FetchFailed(FetchOp),
    LiveUpdatesUnavailable,
}

/// User-visible, dismissible notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Bounded notice list; oldest notices fall off first.
#[derive(Debug, Clone)]
pub struct Notices {
    items: Vec<Notice>,
    next_id: u64,
    limit: usize,
}

impl Notices {
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
            limit: limit.max(1),
        }
    }

    pub fn raise(&mut self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notice {
            id,
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        });
        if self.items.len() > self.limit {
            let excess = self.items.len() - self.limit;
            self.items.drain(0..excess);
        }
        id
    }

    /// Returns `false` if no notice had that id.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn as_slice(&self) -> &[Notice] {
        &self.items
    }
}

/// Non-error outcomes worth surfacing for debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub stale_results_discarded: u64,
    pub duplicate_pushes_ignored: u64,
    pub unfocused_pushes_dropped: u64,
}

/// What the dashboard renders. Produced by the controller, never mutated by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub revision: u64,
    pub competitors: Vec<Competitor>,
    pub loading_competitors: bool,
    pub adding_competitor: bool,
    pub draft: CompetitorDraft,
    pub draft_error: Option<DraftError>,
    pub focused_competitor_id: Option<CompetitorId>,
    pub focused_competitor_name: Option<String>,
    pub loading_insights_for: Option<CompetitorId>,
    /// Last N insights, most recently appended first.
    pub insights: Vec<InsightCard>,
    /// Length of the whole focused sequence.
    pub total_insights: usize,
    pub chart_series: TimeSeries,
    pub notices: Vec<Notice>,
    pub diagnostics: Diagnostics,
    pub live_updates: bool,
}

impl ViewModel {
    /// Snapshot before the first load resolves: list is loading.
    pub fn initial() -> Self {
        Self {
            revision: 0,
            competitors: Vec::new(),
            loading_competitors: true,
            adding_competitor: false,
            draft: CompetitorDraft::default(),
            draft_error: None,
            focused_competitor_id: None,
            focused_competitor_name: None,
            loading_insights_for: None,
            insights: Vec::new(),
            total_insights: 0,
            chart_series: TimeSeries::default(),
            notices: Vec::new(),
            diagnostics: Diagnostics::default(),
            live_updates: false,
        }
    }

    pub fn list_state(&self) -> ListState {
        if self.loading_competitors {
            ListState::Loading
        } else if self.competitors.is_empty() {
            ListState::Empty
        } else {
            ListState::Ready
        }
    }

    pub fn chart_state(&self) -> ChartState {
        if self.chart_series.is_empty() {
            ChartState::NoData
        } else {
            ChartState::Series
        }
    }

    /// The create control is disabled while a create is outstanding.
    pub fn can_submit(&self) -> bool {
        !self.adding_competitor
    }
}
