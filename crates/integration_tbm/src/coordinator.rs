//! Poll coordination
//!
//! [`FeedCoordinator`] owns the latest good [`Snapshot`] for one stop
//! selection. A refresh either replaces it completely or leaves it alone, so
//! readers never observe a partial update.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::client::DepartureFeed;
use crate::config::StopSelection;
use crate::error::FeedError;
use crate::snapshot::Snapshot;

/// Keeps the last successful snapshot of a stop selection
pub struct FeedCoordinator {
    feed: Arc<dyn DepartureFeed>,
    selection: StopSelection,
    current: ArcSwapOption<Snapshot>,
    polls: AtomicU64,
    failures: AtomicU64,
    /// Bumped after every successful refresh
    notify: watch::Sender<u64>,
}

impl std::fmt::Debug for FeedCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCoordinator")
            .field("selection", &self.selection)
            .field("polls", &self.poll_count())
            .field("failures", &self.failure_count())
            .finish_non_exhaustive()
    }
}

impl FeedCoordinator {
    /// Create a coordinator with no snapshot yet
    #[must_use]
    pub fn new(feed: Arc<dyn DepartureFeed>, selection: StopSelection) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            feed,
            selection,
            current: ArcSwapOption::empty(),
            polls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            notify,
        }
    }

    /// Poll the feed once
    ///
    /// On success the new snapshot replaces the previous one. On failure the
    /// previous snapshot is kept and the error is returned; retrying is left
    /// to the caller's schedule.
    ///
    /// # Errors
    ///
    /// Returns the feed error of a failed poll.
    #[instrument(skip(self), fields(stop_id = %self.selection.stop_id))]
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, FeedError> {
        self.polls.fetch_add(1, Ordering::Relaxed);

        match self.feed.fetch_snapshot(&self.selection).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.current.store(Some(Arc::clone(&snapshot)));
                info!(count = snapshot.departures.len(), "Departures refreshed");
                self.notify.send_modify(|version| *version += 1);
                Ok(snapshot)
            },
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    stale = self.current.load().is_some(),
                    "Refresh failed, keeping previous departures"
                );
                Err(e)
            },
        }
    }

    /// The last successful snapshot, if any
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// The watched stop selection
    #[must_use]
    pub const fn selection(&self) -> &StopSelection {
        &self.selection
    }

    /// Number of refresh attempts so far
    #[must_use]
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Number of failed refresh attempts so far
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Subscribe to successful refreshes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Departure, Line, RawDeparture, Stop};
    use crate::snapshot::sort_departures;

    /// Answers each `get_departures` call with the next scripted outcome
    struct ScriptedFeed {
        outcomes: Mutex<Vec<Result<Vec<u32>, FeedError>>>,
    }

    impl ScriptedFeed {
        fn new(mut outcomes: Vec<Result<Vec<u32>, FeedError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }
    }

    #[async_trait]
    impl DepartureFeed for ScriptedFeed {
        async fn get_all_stops(&self) -> Result<Vec<Stop>, FeedError> {
            Ok(Vec::new())
        }

        async fn get_stop_by_id(&self, _stop_id: &str) -> Result<Option<Stop>, FeedError> {
            Ok(None)
        }

        async fn get_lines(&self) -> Result<Vec<Line>, FeedError> {
            Ok(Vec::new())
        }

        async fn get_departures(
            &self,
            _stop_id: &str,
            _line_id: Option<&str>,
        ) -> Result<Vec<Departure>, FeedError> {
            let next = self.outcomes.lock().unwrap().pop().unwrap();
            let waits = next?;
            let raw = waits
                .into_iter()
                .map(|wait| RawDeparture {
                    line_code: "bordeaux:Line:A:LOC".to_string(),
                    destination: "La Gardette".to_string(),
                    countdown: Some(wait),
                    ..RawDeparture::default()
                })
                .collect();
            Ok(sort_departures(raw, chrono::Utc::now()))
        }

        async fn check_reachable(&self) -> bool {
            true
        }
    }

    fn coordinator(outcomes: Vec<Result<Vec<u32>, FeedError>>) -> FeedCoordinator {
        FeedCoordinator::new(
            Arc::new(ScriptedFeed::new(outcomes)),
            StopSelection::new("3687", "Quinconces"),
        )
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let coordinator = coordinator(Vec::new());
        assert!(coordinator.snapshot().is_none());
        assert_eq!(coordinator.poll_count(), 0);
        assert_eq!(coordinator.selection().stop_id, "3687");
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let coordinator = coordinator(vec![Ok(vec![7, 3]), Ok(vec![1])]);

        coordinator.refresh().await.unwrap();
        let first = coordinator.snapshot().unwrap();
        assert_eq!(first.departures.len(), 2);
        assert_eq!(first.next_departure().unwrap().waiting_minutes, 3);

        coordinator.refresh().await.unwrap();
        let second = coordinator.snapshot().unwrap();
        assert_eq!(second.departures.len(), 1);
        assert_eq!(coordinator.poll_count(), 2);
        assert_eq!(coordinator.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let coordinator = coordinator(vec![
            Ok(vec![5]),
            Err(FeedError::RequestFailed {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
        ]);

        coordinator.refresh().await.unwrap();
        let err = coordinator.refresh().await.unwrap_err();
        assert!(err.is_retryable());

        let kept = coordinator.snapshot().unwrap();
        assert_eq!(kept.departures[0].waiting_minutes, 5);
        assert_eq!(coordinator.poll_count(), 2);
        assert_eq!(coordinator.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_without_previous_snapshot() {
        let coordinator = coordinator(vec![Err(FeedError::Timeout { timeout_secs: 5 })]);
        assert!(coordinator.refresh().await.is_err());
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_successful_refreshes_only() {
        let coordinator = coordinator(vec![
            Ok(vec![2]),
            Err(FeedError::ConnectionFailed("reset".to_string())),
        ]);
        let receiver = coordinator.subscribe();

        coordinator.refresh().await.unwrap();
        assert_eq!(*receiver.borrow(), 1);

        let _ = coordinator.refresh().await;
        assert_eq!(*receiver.borrow(), 1);
    }
}
