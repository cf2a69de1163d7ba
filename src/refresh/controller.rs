// src/refresh/controller.rs
//! Staleness-gated refresh with at most one fetch in flight.
//!
//! Every entry point takes the state lock once, decides (join / start / skip),
//! releases the lock and only then awaits. The fetch itself runs on its own
//! task, so a caller dropping its future never strands the in-flight marker.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::display::DisplayPort;
use crate::feed::source::{FeedSource, FetchError};
use crate::feed::types::FeedSnapshot;

type FetchResult = Result<Arc<FeedSnapshot>, FetchError>;

/// What a `refresh_if_required` call ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Cached snapshot is still fresh; nothing was fetched.
    Fresh,
    /// A fetch ran (started here or joined) and produced this snapshot.
    Refreshed(Arc<FeedSnapshot>),
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Fetches started by the refresh controller.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Fetches that failed, labelled by error kind."
        );
        describe_counter!(
            "feed_refresh_joined_total",
            "Refresh calls satisfied by an already running fetch."
        );
        describe_counter!(
            "feed_refresh_fresh_total",
            "refresh_if_required calls skipped because the snapshot was fresh."
        );
        describe_counter!(
            "feed_display_panics_total",
            "Accepted snapshots whose display backend panicked."
        );
        describe_histogram!("feed_fetch_ms", "Fetch duration in milliseconds.");
        describe_gauge!(
            "feed_last_success_ts",
            "Caller-supplied unix ts of the last successful refresh."
        );
    });
}

struct InFlight {
    generation: u64,
    tx: Arc<watch::Sender<Option<FetchResult>>>,
}

struct RefreshState {
    last_success_at: Option<DateTime<Utc>>,
    in_flight: Option<InFlight>,
    snapshot: Arc<FeedSnapshot>,
    generation: u64,
}

impl RefreshState {
    fn is_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        match self.last_success_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= stale_after,
        }
    }

    fn join(&self) -> Option<watch::Receiver<Option<FetchResult>>> {
        self.in_flight.as_ref().map(|f| f.tx.subscribe())
    }
}

struct Inner {
    source: Arc<dyn FeedSource>,
    display: Arc<dyn DisplayPort>,
    state: Mutex<RefreshState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the refresh state for one feed. Clones share the same state.
#[derive(Clone)]
pub struct RefreshController {
    inner: Arc<Inner>,
}

impl RefreshController {
    pub fn new(source: Arc<dyn FeedSource>, display: Arc<dyn DisplayPort>) -> Self {
        ensure_metrics_described();
        Self {
            inner: Arc::new(Inner {
                source,
                display,
                state: Mutex::new(RefreshState {
                    last_success_at: None,
                    in_flight: None,
                    snapshot: Arc::new(FeedSnapshot::empty()),
                    generation: 0,
                }),
            }),
        }
    }

    /// Fetch only if the snapshot is older than `stale_after` (or was never
    /// fetched). Joins a running fetch instead of starting another one.
    pub async fn refresh_if_required(
        &self,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, FetchError> {
        let rx = {
            let mut st = self.inner.state();
            if let Some(rx) = st.join() {
                counter!("feed_refresh_joined_total").increment(1);
                tracing::debug!(source = self.inner.source.name(), "joining in-flight fetch");
                rx
            } else if st.is_stale(stale_after, now) {
                self.begin(&mut st, now)
            } else {
                counter!("feed_refresh_fresh_total").increment(1);
                tracing::debug!(
                    source = self.inner.source.name(),
                    last_success_at = ?st.last_success_at,
                    "snapshot fresh; skipping fetch"
                );
                return Ok(RefreshOutcome::Fresh);
            }
        };

        wait(rx).await.map(RefreshOutcome::Refreshed)
    }

    /// Fetch regardless of staleness, unless a fetch is already running, in
    /// which case its outcome is returned.
    pub async fn refresh_last_update(&self, now: DateTime<Utc>) -> FetchResult {
        let rx = {
            let mut st = self.inner.state();
            if let Some(rx) = st.join() {
                counter!("feed_refresh_joined_total").increment(1);
                tracing::debug!(source = self.inner.source.name(), "joining in-flight fetch");
                rx
            } else {
                self.begin(&mut st, now)
            }
        };

        wait(rx).await
    }

    /// Last accepted snapshot; empty before the first success. Never waits on a fetch.
    pub fn current_snapshot(&self) -> Arc<FeedSnapshot> {
        Arc::clone(&self.inner.state().snapshot)
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state().last_success_at
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.state().in_flight.is_some()
    }

    /// Callers currently waiting on the in-flight fetch (including the one that started it).
    pub fn waiting_callers(&self) -> usize {
        self.inner
            .state()
            .in_flight
            .as_ref()
            .map(|f| f.tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn is_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        self.inner.state().is_stale(stale_after, now)
    }

    // Called with the state lock held.
    fn begin(&self, st: &mut RefreshState, now: DateTime<Utc>) -> watch::Receiver<Option<FetchResult>> {
        st.generation += 1;
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        st.in_flight = Some(InFlight {
            generation: st.generation,
            tx: Arc::clone(&tx),
        });

        let completion = Completion {
            inner: Arc::clone(&self.inner),
            generation: st.generation,
            tx,
            done: false,
        };
        tokio::spawn(run_fetch(completion, now));
        rx
    }
}

async fn wait(mut rx: watch::Receiver<Option<FetchResult>>) -> FetchResult {
    // Sender gone without a value means the fetch task never resolved.
    let outcome = rx
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|v| (*v).clone());
    outcome.unwrap_or(Err(FetchError::Interrupted))
}

async fn run_fetch(completion: Completion, now: DateTime<Utc>) {
    let inner = Arc::clone(&completion.inner);
    let name = inner.source.name();

    counter!("feed_fetch_total").increment(1);
    let t0 = std::time::Instant::now();
    let res = inner.source.fetch().await;
    histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let outcome = match res {
        Ok(snapshot) => {
            let snapshot = Arc::new(snapshot);
            {
                let mut st = inner.state();
                st.snapshot = Arc::clone(&snapshot);
                st.last_success_at = Some(now);
            }
            gauge!("feed_last_success_ts").set(now.timestamp() as f64);

            // Before the in-flight marker clears, so the next fetch can't publish first.
            // The snapshot is already committed, so a panicking backend is logged
            // and the refresh still resolves as a success.
            let shown = std::panic::catch_unwind(AssertUnwindSafe(|| {
                inner.display.display(&snapshot)
            }));
            if shown.is_err() {
                counter!("feed_display_panics_total").increment(1);
                tracing::error!(target: "refresh", source = name, "display backend panicked");
            }

            tracing::info!(
                target: "refresh",
                source = name,
                events = snapshot.len(),
                waiters = completion.tx.receiver_count(),
                "feed refreshed"
            );
            Ok(snapshot)
        }
        Err(e) => {
            counter!("feed_fetch_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(target: "refresh", source = name, error = %e, "feed fetch failed");
            Err(e)
        }
    };

    completion.resolve(outcome);
}

/// Clears the in-flight marker and wakes every waiter exactly once, even if
/// the fetch task unwinds before producing an outcome. Only a panicking
/// source gets here unresolved (waiters see `Interrupted`); display panics are
/// caught in `run_fetch` after the snapshot is committed.
struct Completion {
    inner: Arc<Inner>,
    generation: u64,
    tx: Arc<watch::Sender<Option<FetchResult>>>,
    done: bool,
}

impl Completion {
    fn resolve(mut self, outcome: FetchResult) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: FetchResult) {
        self.done = true;
        {
            let mut st = self.inner.state();
            if st
                .in_flight
                .as_ref()
                .is_some_and(|f| f.generation == self.generation)
            {
                st.in_flight = None;
            }
        }
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(FetchError::Interrupted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingDisplay;
    use crate::feed::types::{EventKind, EventRecord};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FeedSource for Counting {
        async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::Network("down".into()));
            }
            Ok(FeedSnapshot::from_records(vec![EventRecord {
                id: format!("ev-{n}"),
                occurred_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
                actor: "alice".into(),
                kind: EventKind::Push,
                repo: None,
                payload: serde_json::Value::Null,
            }]))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn starts_empty_and_stale() {
        let src = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let ctl = RefreshController::new(src, Arc::new(RecordingDisplay::new()));
        assert!(ctl.current_snapshot().is_empty());
        assert_eq!(ctl.last_success_at(), None);
        assert!(ctl.is_stale(Duration::seconds(60), t0()));
        assert!(!ctl.is_in_flight());
        assert_eq!(ctl.waiting_callers(), 0);
    }

    #[tokio::test]
    async fn staleness_boundary_is_inclusive() {
        let src = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let ctl = RefreshController::new(src.clone(), Arc::new(RecordingDisplay::new()));
        let stale = Duration::seconds(60);

        ctl.refresh_if_required(stale, t0()).await.unwrap();
        let early = ctl
            .refresh_if_required(stale, t0() + Duration::seconds(59))
            .await
            .unwrap();
        assert_eq!(early, RefreshOutcome::Fresh);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);

        let exact = ctl
            .refresh_if_required(stale, t0() + Duration::seconds(60))
            .await
            .unwrap();
        assert!(matches!(exact, RefreshOutcome::Refreshed(_)));
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert!(!ctl.is_in_flight());
    }

    #[tokio::test]
    async fn failure_keeps_in_flight_clear_and_controller_usable() {
        let src = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let ctl = RefreshController::new(src.clone(), Arc::new(RecordingDisplay::new()));
        let err = ctl.refresh_last_update(t0()).await.unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(!ctl.is_in_flight());

        // No internal retry; the next call fetches again.
        let _ = ctl.refresh_last_update(t0()).await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    struct Exploding;

    impl DisplayPort for Exploding {
        fn display(&self, _snapshot: &FeedSnapshot) {
            panic!("renderer crashed");
        }
    }

    #[tokio::test]
    async fn display_panic_still_resolves_as_success() {
        let src = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let ctl = RefreshController::new(src, Arc::new(Exploding));

        let snap = ctl.refresh_last_update(t0()).await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(ctl.last_success_at(), Some(t0()));
        assert!(Arc::ptr_eq(&snap, &ctl.current_snapshot()));
        assert!(!ctl.is_in_flight());
    }
}
