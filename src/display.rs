// src/display.rs
//! Presentation hand-off. The controller calls `display` once per accepted snapshot.

use std::sync::{Arc, Mutex, PoisonError};

use crate::feed::types::FeedSnapshot;

/// Receives each newly accepted snapshot. Must return promptly; the refresh
/// controller does not guard against a slow backend.
pub trait DisplayPort: Send + Sync {
    fn display(&self, snapshot: &FeedSnapshot);
}

/// Logs a short summary of every snapshot.
#[derive(Debug, Clone, Default)]
pub struct LogDisplay {
    preview: usize,
}

impl LogDisplay {
    pub fn new(preview: usize) -> Self {
        Self { preview }
    }
}

impl DisplayPort for LogDisplay {
    fn display(&self, snapshot: &FeedSnapshot) {
        tracing::info!(
            target: "display",
            events = snapshot.len(),
            newest = snapshot.newest().map(|e| e.id.as_str()).unwrap_or("-"),
            "feed snapshot"
        );
        for ev in snapshot.iter().take(self.preview) {
            tracing::info!(target: "display", at = %ev.occurred_at.to_rfc3339(), "{}", ev.summary());
        }
    }
}

/// Fans one snapshot out to every registered backend, in order.
#[derive(Default, Clone)]
pub struct DisplayMux {
    backends: Vec<Arc<dyn DisplayPort>>,
}

impl DisplayMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: Arc<dyn DisplayPort>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl DisplayPort for DisplayMux {
    fn display(&self, snapshot: &FeedSnapshot) {
        for b in &self.backends {
            b.display(snapshot);
        }
    }
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub calls: Mutex<Vec<FeedSnapshot>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn last(&self) -> Option<FeedSnapshot> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl DisplayPort for RecordingDisplay {
    fn display(&self, snapshot: &FeedSnapshot) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mux_forwards_to_every_backend() {
        let a = Arc::new(RecordingDisplay::new());
        let b = Arc::new(RecordingDisplay::new());
        let mux = DisplayMux::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(LogDisplay::new(3)));
        assert_eq!(mux.len(), 3);

        mux.display(&FeedSnapshot::empty());
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
        assert_eq!(a.last(), Some(FeedSnapshot::empty()));
    }
}
