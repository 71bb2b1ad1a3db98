// src/error.rs
//! Failure taxonomy. Collaborators speak `anyhow::Result`; the dashboard maps
//! those into the variants below. Stale results and duplicate pushes are
//! outcomes, not errors (see `fetch::InsightsFreshness` and `push::PushOutcome`).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOp {
    ListCompetitors,
    CreateCompetitor,
    ListInsights,
}

impl FetchOp {
    /// Notice text shown to the user.
    pub fn user_message(self) -> &'static str {
        match self {
            FetchOp::ListCompetitors => "Error fetching competitors",
            FetchOp::CreateCompetitor => "Error adding competitor",
            FetchOp::ListInsights => "Error fetching insights",
        }
    }

    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            FetchOp::ListCompetitors => "list_competitors",
            FetchOp::CreateCompetitor => "create_competitor",
            FetchOp::ListInsights => "list_insights",
        }
    }
}

impl fmt::Display for FetchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Any failure of a collaborator call. Prior state stays intact.
    #[error("{op} failed: {message}")]
    TransientFetch { op: FetchOp, message: String },

    #[error(transparent)]
    MalformedDraft(#[from] DraftError),

    /// The controller task has exited (logout, unmount or dropped handles).
    #[error("dashboard is not mounted")]
    Unmounted,
}

impl DashboardError {
    pub fn transient(op: FetchOp, err: &anyhow::Error) -> Self {
        DashboardError::TransientFetch {
            op,
            message: format!("{err:#}"),
        }
    }
}

/// Field-level validation failure on the add-competitor draft.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum DraftError {
    #[error("competitor name is required")]
    EmptyName,
    #[error("website must be an absolute http(s) URL, got {0:?}")]
    InvalidWebsite(String),
}

/// Auth collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The service answered and refused; carries its message.
    #[error("{0}")]
    Rejected(String),
    #[error("auth request failed: {0}")]
    Transport(String),
}
