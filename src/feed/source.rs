// src/feed/source.rs
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::feed::types::FeedSnapshot;

/// Why a single fetch did not produce a snapshot.
///
/// `Clone` so one failed attempt can be handed to every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to parse feed: {0}")]
    ParseFailure(String),

    #[error("remote rejected request with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("fetch task ended without an outcome")]
    Interrupted,
}

impl FetchError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::ParseFailure(_) => "parse",
            FetchError::RemoteRejected { .. } => "rejected",
            FetchError::Interrupted => "interrupted",
        }
    }
}

/// Performs one remote retrieval and returns a complete, ordered snapshot.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError>;
    fn name(&self) -> &'static str;
}

/// Puts a deadline on an inner source's fetch.
pub struct TimeoutSource<S> {
    inner: S,
    timeout: Duration,
}

impl<S: FeedSource> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<S: FeedSource> FeedSource for TimeoutSource<S> {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
        match tokio::time::timeout(self.timeout, self.inner.fetch()).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(source = self.inner.name(), timeout = ?self.timeout, "fetch deadline elapsed");
                Err(FetchError::Timeout(self.timeout))
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
