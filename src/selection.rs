//! Focus + insight sequence for the selected competitor, and the session's
//! competitor list.
//!
//! Both are plain owned state; the controller is the only writer.

use std::collections::HashSet;

use crate::model::{Competitor, CompetitorId, Insight, InsightId};

/// Result of offering one insight to the focused sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// An entry with the same non-empty identity is already present.
    Duplicate,
}

/// At most one focused competitor, owning an append-only insight sequence.
///
/// The sequence is kept in arrival order, never re-sorted by timestamp.
#[derive(Debug, Default, Clone)]
pub struct SelectionState {
    focus: Option<CompetitorId>,
    insights: Vec<Insight>,
    seen: HashSet<InsightId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Option<&CompetitorId> {
        self.focus.as_ref()
    }

    pub fn is_focused(&self, id: &CompetitorId) -> bool {
        self.focus.as_ref() == Some(id)
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn len(&self) -> usize {
        self.insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
    }

    /// Switches focus and replaces the whole sequence in one step.
    /// Repeated identities in `fetched` keep their first occurrence.
    /// Returns how many duplicates were dropped.
    pub fn replace(&mut self, focus: CompetitorId, fetched: Vec<Insight>) -> usize {
        self.focus = Some(focus);
        self.insights = Vec::with_capacity(fetched.len());
        self.seen.clear();

        let mut dropped = 0;
        for insight in fetched {
            if self.push_unique(insight) == AppendOutcome::Duplicate {
                dropped += 1;
            }
        }
        dropped
    }

    /// Appends to the focused sequence unless the identity is already present.
    /// Insights without identity are always appended.
    pub fn append(&mut self, insight: Insight) -> AppendOutcome {
        self.push_unique(insight)
    }

    fn push_unique(&mut self, insight: Insight) -> AppendOutcome {
        if let Some(id) = insight.identity() {
            if !self.seen.insert(id.clone()) {
                return AppendOutcome::Duplicate;
            }
        }
        self.insights.push(insight);
        AppendOutcome::Appended
    }

    /// Last `n` insights, most recently appended first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Insight> {
        let start = self.insights.len().saturating_sub(n);
        self.insights[start..].iter().rev()
    }
}

/// Competitors known in this session, unique by id, never shrinking.
#[derive(Debug, Default, Clone)]
pub struct CompetitorList {
    items: Vec<Competitor>,
}

impl CompetitorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Competitor] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &CompetitorId) -> Option<&Competitor> {
        self.items.iter().find(|c| &c.id == id)
    }

    /// Adopts the server's list and order. Known competitors missing from the
    /// response are kept at the end (no local deletions). Returns the ids retained that way.
    pub fn sync(&mut self, fetched: Vec<Competitor>) -> Vec<CompetitorId> {
        let mut seen: HashSet<CompetitorId> = HashSet::with_capacity(fetched.len());
        let mut next = Vec::with_capacity(fetched.len().max(self.items.len()));
        for c in fetched {
            if seen.insert(c.id.clone()) {
                next.push(c);
            }
        }

        let mut retained = Vec::new();
        for old in self.items.drain(..) {
            if !seen.contains(&old.id) {
                retained.push(old.id.clone());
                next.push(old);
            }
        }

        self.items = next;
        retained
    }
}
