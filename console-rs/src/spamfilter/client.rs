//! Spam-filter control-channel client
//!
//! Talks to the filter daemon's REST controller. Transport failures are
//! mapped to a small enumerated status vocabulary so the UI can render
//! actionable guidance instead of a stack trace.

use crate::error::{ConsoleError, Result};
use crate::settings::target::Target;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Enumerated control-channel status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Ok,
    KeyMissing,
    KeyMismatch,
    PortClosed,
    PortTimeout,
    Unreachable,
}

impl std::fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlStatus::Ok => write!(f, "ok"),
            ControlStatus::KeyMissing => write!(f, "key missing"),
            ControlStatus::KeyMismatch => write!(f, "key mismatch"),
            ControlStatus::PortClosed => write!(f, "port closed"),
            ControlStatus::PortTimeout => write!(f, "port timeout"),
            ControlStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// One symbol hit inside a history row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolHit {
    #[serde(default)]
    pub score: f64,
}

/// One row of the daemon's message-history ring buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(default, rename = "message-id")]
    pub message_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolHit>,
    #[serde(default)]
    pub rcpt_mime: Vec<String>,
    #[serde(default)]
    pub rcpt_smtp: Vec<String>,
    #[serde(default)]
    pub sender_mime: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub unix_time: i64,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    rows: Vec<HistoryRow>,
}

/// Control-channel client for one resolved target.
pub struct FilterClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl FilterClient {
    pub fn new(target: &Target) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(target.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: target.base_url(),
            auth_token: target.auth_token.clone(),
        })
    }

    fn token(&self) -> Result<&str> {
        self.auth_token
            .as_deref()
            .ok_or_else(|| ConsoleError::Control(ControlStatus::KeyMissing.to_string()))
    }

    fn classify_transport(e: &reqwest::Error) -> ControlStatus {
        if e.is_timeout() {
            ControlStatus::PortTimeout
        } else if e.is_connect() {
            ControlStatus::PortClosed
        } else {
            ControlStatus::Unreachable
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.token()?;
        let url = format!("{}{}", self.base_url, path);
        debug!("control channel GET {url}");

        let response = self
            .http
            .get(&url)
            .header("Password", token)
            .send()
            .await
            .map_err(|e| ConsoleError::Control(Self::classify_transport(&e).to_string()))?;

        match response.status().as_u16() {
            401 | 403 => Err(ConsoleError::Control(
                ControlStatus::KeyMismatch.to_string(),
            )),
            _ => Ok(response.error_for_status()?),
        }
    }

    /// Fetch the daemon's JSON statistics snapshot.
    pub async fn stat(&self) -> Result<serde_json::Value> {
        Ok(self.get("/stat").await?.json().await?)
    }

    /// Fetch the most recent `limit` history rows.
    ///
    /// The daemon's ring buffer caps what it can return; asking for more
    /// than it holds simply yields everything it has.
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        let envelope: HistoryEnvelope = self.get("/history").await?.json().await?;
        let mut rows = envelope.rows;
        rows.sort_by_key(|r| std::cmp::Reverse(r.unix_time));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Probe the control channel and classify the outcome.
    pub async fn probe(&self) -> ControlStatus {
        if self.auth_token.is_none() {
            return ControlStatus::KeyMissing;
        }
        match self.get("/stat").await {
            Ok(_) => ControlStatus::Ok,
            Err(ConsoleError::Control(status)) => match status.as_str() {
                "key mismatch" => ControlStatus::KeyMismatch,
                "port closed" => ControlStatus::PortClosed,
                "port timeout" => ControlStatus::PortTimeout,
                "key missing" => ControlStatus::KeyMissing,
                _ => ControlStatus::Unreachable,
            },
            Err(_) => ControlStatus::Unreachable,
        }
    }
}
