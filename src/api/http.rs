// src/api/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use super::{AuthService, AuthToken, CompetitorApi, Credentials};
use crate::error::AuthError;
use crate::model::{Competitor, CompetitorId, Insight, NewCompetitor};

const USER_AGENT: &str = "competitor-insights/0.1";
const AUTH_FALLBACK_MSG: &str = "Authentication error. Please try again.";

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building http client")
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Competitor service over HTTP with bearer auth.
#[derive(Clone)]
pub struct HttpCompetitorApi {
    base: String,
    client: Client,
    token: AuthToken,
}

impl HttpCompetitorApi {
    pub fn new(base_url: &str, token: AuthToken, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base: base_url.to_string(),
            client: build_client(timeout)?,
            token,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let resp = req
            .bearer_auth(self.token.expose())
            .send()
            .await
            .with_context(|| format!("request {what}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("{what} returned status {status}");
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decode {what} body"))
    }
}

#[async_trait]
impl CompetitorApi for HttpCompetitorApi {
    async fn list_competitors(&self) -> Result<Vec<Competitor>> {
        let url = join(&self.base, "competitors");
        self.send_json(self.client.get(&url), "GET competitors").await
    }

    async fn create_competitor(&self, draft: &NewCompetitor) -> Result<Competitor> {
        let url = join(&self.base, "competitors");
        self.send_json(self.client.post(&url).json(draft), "POST competitors")
            .await
    }

    async fn list_insights(&self, competitor_id: &CompetitorId) -> Result<Vec<Insight>> {
        let url = join(
            &self.base,
            &format!("competitors/{}/insights", competitor_id.as_str()),
        );
        let raw: Vec<serde_json::Value> =
            self.send_json(self.client.get(&url), "GET insights").await?;
        Ok(decode_insights(competitor_id, raw))
    }
}

/// Decodes each record on its own; a malformed record is skipped, not the whole list.
fn decode_insights(competitor_id: &CompetitorId, raw: Vec<serde_json::Value>) -> Vec<Insight> {
    raw.into_iter()
        .filter_map(|v| match serde_json::from_value::<Insight>(v) {
            Ok(insight) => Some(insight),
            Err(e) => {
                warn!(%competitor_id, error = %e, "skipping malformed insight record");
                None
            }
        })
        .collect()
}

/// Auth service over HTTP. Surfaces the server's `msg` on rejection.
#[derive(Clone)]
pub struct HttpAuthService {
    base: String,
    client: Client,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Deserialize)]
struct MsgBody {
    msg: Option<String>,
}

impl HttpAuthService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base: base_url.to_string(),
            client: build_client(timeout)?,
        })
    }

    async fn exchange(&self, path: &str, body: &Credentials) -> Result<AuthToken, AuthError> {
        let resp = self
            .client
            .post(join(&self.base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        token_from_response(status, &text)
    }
}

fn token_from_response(status: StatusCode, body: &str) -> Result<AuthToken, AuthError> {
    if status.is_success() {
        if let Ok(TokenBody { token }) = serde_json::from_str::<TokenBody>(body) {
            if !token.is_empty() {
                return Ok(AuthToken::new(token));
            }
        }
    }
    let msg = serde_json::from_str::<MsgBody>(body)
        .ok()
        .and_then(|b| b.msg)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| AUTH_FALLBACK_MSG.to_string());
    Err(AuthError::Rejected(msg))
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, AuthError> {
        self.exchange("auth/login", credentials).await
    }

    async fn register(&self, profile: &Credentials) -> Result<AuthToken, AuthError> {
        self.exchange("auth/register", profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join("http://h/api/", "/competitors"), "http://h/api/competitors");
        assert_eq!(join("http://h/api", "auth/login"), "http://h/api/auth/login");
    }

    #[test]
    fn token_is_taken_from_success_body() {
        let t = token_from_response(StatusCode::OK, r#"{"token":"abc"}"#).unwrap();
        assert_eq!(t.expose(), "abc");
    }

    #[test]
    fn rejection_prefers_server_message() {
        let e = token_from_response(StatusCode::BAD_REQUEST, r#"{"msg":"Invalid credentials"}"#)
            .unwrap_err();
        assert_eq!(e, AuthError::Rejected("Invalid credentials".into()));

        let e = token_from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>").unwrap_err();
        assert_eq!(e, AuthError::Rejected(AUTH_FALLBACK_MSG.into()));

        // 200 without a token is still a failure
        let e = token_from_response(StatusCode::OK, "{}").unwrap_err();
        assert_eq!(e, AuthError::Rejected(AUTH_FALLBACK_MSG.into()));
    }

    #[test]
    fn malformed_insight_record_is_skipped_alone() {
        let raw: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"_id":"i1","date":"2024-01-01","summary":"ok"},
                {"_id":"i2","date":"not a date","summary":"bad"},
                {"_id":"i3","date":"2024-01-03T10:00:00Z","summary":"ok","type":"pricing"}
            ]"#,
        )
        .unwrap();
        let got = decode_insights(&"c1".into(), raw);
        let ids: Vec<&str> = got.iter().filter_map(|i| i.identity()).map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i3"]);
    }
}
