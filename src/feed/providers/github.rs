// src/feed/providers/github.rs
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::feed::source::{FeedSource, FetchError};
use crate::feed::types::{EventKind, EventRecord, FeedSnapshot};

pub const DEFAULT_EVENTS_URL: &str = "https://api.github.com/events";

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    actor: RawActor,
    repo: Option<RawRepo>,
    created_at: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawActor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    name: String,
}

pub struct GithubEventsProvider {
    mode: Mode,
}

enum Mode {
    // Keeps its own copy so tests can build from any &str.
    Fixture(String),
    Http {
        url: String,
        user_agent: String,
        timeout: Duration,
        client: reqwest::Client,
    },
}

impl GithubEventsProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// HTTP mode. `timeout` bounds the whole request including the body read;
    /// a client that can't be built with it is an error, not a silent fallback.
    pub fn from_url(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building reqwest client for feed provider")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                user_agent: user_agent.into(),
                timeout,
                client,
            },
        })
    }

    pub fn parse_events(body: &str) -> Result<FeedSnapshot, FetchError> {
        let t0 = std::time::Instant::now();
        let raw: Vec<RawEvent> =
            serde_json::from_str(body).map_err(|e| FetchError::ParseFailure(e.to_string()))?;

        let mut out = Vec::with_capacity(raw.len());
        for it in raw {
            let occurred_at = DateTime::parse_from_rfc3339(&it.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    FetchError::ParseFailure(format!("event {}: bad created_at: {e}", it.id))
                })?;
            out.push(EventRecord {
                id: it.id,
                occurred_at,
                actor: it.actor.login,
                kind: EventKind::from_tag(&it.kind),
                repo: it.repo.map(|r| r.name),
                payload: it.payload,
            });
        }

        let snapshot = FeedSnapshot::from_records(out);
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        counter!("feed_events_total").increment(snapshot.len() as u64);
        Ok(snapshot)
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout_hint: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout_hint)
    } else if let Some(status) = e.status() {
        FetchError::RemoteRejected {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait]
impl FeedSource for GithubEventsProvider {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_events(s),

            Mode::Http {
                url,
                user_agent,
                timeout,
                client,
            } => {
                let hint = *timeout;
                let resp = client
                    .get(url.as_str())
                    .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                    .header(reqwest::header::USER_AGENT, user_agent.as_str())
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::warn!(error = ?e, provider = "github", "provider http error");
                        map_reqwest_error(e, hint)
                    })?;

                let status = resp.status();
                if !status.is_success() {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(FetchError::RemoteRejected {
                        status: status.as_u16(),
                        message: message.chars().take(200).collect(),
                    });
                }

                let body = resp.text().await.map_err(|e| map_reqwest_error(e, hint))?;
                Self::parse_events(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
