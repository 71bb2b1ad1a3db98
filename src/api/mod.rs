// src/api/mod.rs
//! Collaborator contracts consumed by the dashboard core.
//!
//! Transport is not the core's business: every call returns an explicit
//! `anyhow::Result`, and the controller matches on success/failure.

pub mod http;
pub mod mock;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::model::{Competitor, CompetitorId, Insight, NewCompetitor};

pub use http::{HttpAuthService, HttpCompetitorApi};
pub use mock::MockApi;

/// Request/response access to the competitor service.
#[async_trait]
pub trait CompetitorApi: Send + Sync {
    async fn list_competitors(&self) -> Result<Vec<Competitor>>;
    async fn create_competitor(&self, draft: &NewCompetitor) -> Result<Competitor>;
    async fn list_insights(&self, competitor_id: &CompetitorId) -> Result<Vec<Insight>>;
}

/// Opaque session token. Never logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<{} chars>)", self.0.len())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> std::result::Result<AuthToken, AuthError>;
    async fn register(&self, profile: &Credentials) -> std::result::Result<AuthToken, AuthError>;
}
