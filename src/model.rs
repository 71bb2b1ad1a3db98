//! # Domain records
//! Competitors, insights and the push record shape, as exchanged with the
//! competitor service. Identities are opaque strings (`_id` on the wire).

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DraftError;

/// Category shown when an insight carries no `type`.
pub const DEFAULT_CATEGORY: &str = "update";

/// Opaque, server-assigned competitor identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetitorId(String);

impl CompetitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompetitorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Insight identity. Push-originated records may arrive without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsightId(String);

impl InsightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    #[serde(rename = "_id", alias = "id")]
    pub id: CompetitorId,
    pub name: String,
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

/// A single timestamped observation about a competitor.
///
/// `competitor_id` is a lookup hint only; ownership is decided by whoever
/// fetched or routed the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<InsightId>,
    #[serde(
        rename = "competitorId",
        alias = "competitor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub competitor_id: Option<CompetitorId>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Insight {
    /// Identity used for de-duplication; empty ids count as absent.
    pub fn identity(&self) -> Option<&InsightId> {
        self.id.as_ref().filter(|id| !id.as_str().is_empty())
    }

    pub fn category(&self) -> &str {
        match self.category.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => DEFAULT_CATEGORY,
        }
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (UTC), or a bare `YYYY-MM-DD`
/// (UTC midnight).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

fn deserialize_timestamp<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

/// Form state for the "add competitor" control. Kept verbatim until a create succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub twitter: String,
}

impl CompetitorDraft {
    pub fn new(name: impl Into<String>, website: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: website.into(),
            twitter: String::new(),
        }
    }

    pub fn with_twitter(mut self, handle: impl Into<String>) -> Self {
        self.twitter = handle.into();
        self
    }

    /// Checks the draft before any request is sent.
    pub fn validate(&self) -> Result<NewCompetitor, DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::EmptyName);
        }

        let website = self.website.trim();
        let valid = reqwest::Url::parse(website)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            return Err(DraftError::InvalidWebsite(website.to_string()));
        }

        let twitter = self.twitter.trim();
        Ok(NewCompetitor {
            name: name.to_string(),
            website: website.to_string(),
            twitter: (!twitter.is_empty()).then(|| twitter.to_string()),
        })
    }
}

/// Validated create payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompetitor {
    pub name: String,
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

/// One delivery on the `new-insight` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRecord {
    #[serde(rename = "competitorId")]
    pub competitor_id: CompetitorId,
    pub insight: Insight,
}

/// Chart input: parallel label/value sequences, one entry per insight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<String>,
    pub values: Vec<u32>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
