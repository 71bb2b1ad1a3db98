// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod push;
pub mod selection;
pub mod server;
pub mod view;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::aggregate;
pub use crate::controller::{ControllerConfig, DashboardController, DashboardHandle, Session};
pub use crate::error::{DashboardError, DraftError, FetchOp};
pub use crate::model::{
    Competitor, CompetitorDraft, CompetitorId, Insight, InsightId, PushRecord, TimeSeries,
};
pub use crate::push::{LocalPushHub, PushChannel, NEW_INSIGHT_TOPIC};
pub use crate::view::{ListState, ViewModel};
