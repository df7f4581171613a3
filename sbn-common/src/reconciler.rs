//! Playlist integrity reconciler
//!
//! Effectful half of playlist reconciliation. The [`Reconciler`] itself holds
//! no state: it asks the existence oracle which audio is gone and asks the
//! playlist store to drop the dangling entries. Re-entrancy for a single
//! playlist is the caller's concern; [`CleanupTracker`] implements that
//! in-flight guard for calling surfaces.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{playlist_cache_key, EventBus, SbnEvent, AUDIO_FILES_CACHE_KEY};
use crate::integrity::{
    detect_missing, failure_message, CleanupState, PlaylistEntry, PlaylistIntegrityReport,
};
use crate::{Error, Result};

/// Playlist store collaborator
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Current entries of a playlist, in order
    async fn playlist_entries(&self, playlist_id: i64) -> Result<Vec<PlaylistEntry>>;

    /// Remove every entry whose audio no longer exists; returns entries removed
    async fn clean_playlist(&self, playlist_id: i64) -> Result<u64>;
}

/// Storage existence oracle
#[async_trait]
pub trait AudioOracle: Send + Sync {
    async fn audio_exists(&self, audio_id: i64) -> Result<bool>;
}

/// Check that a cleanup names a playlist that can exist
pub fn resolve_target(playlist_id: Option<i64>) -> Result<i64> {
    match playlist_id {
        Some(id) if id > 0 => Ok(id),
        Some(id) => Err(Error::InvalidTarget(format!("invalid playlist id {}", id))),
        None => Err(Error::InvalidTarget("no playlist selected".to_string())),
    }
}

/// Stateless detection + cleanup orchestrator
pub struct Reconciler<S> {
    store: S,
    events: EventBus,
}

impl<S: PlaylistStore> Reconciler<S> {
    pub fn new(store: S, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Detection pass against the existence oracle
    ///
    /// The oracle is asked once per distinct audio id, concurrently.
    pub async fn detect<O: AudioOracle + ?Sized>(
        &self,
        playlist_id: Option<i64>,
        oracle: &O,
    ) -> Result<PlaylistIntegrityReport> {
        let playlist_id = resolve_target(playlist_id)?;
        let entries = self.store.playlist_entries(playlist_id).await?;

        let mut distinct: Vec<i64> = Vec::new();
        let mut seen = HashSet::new();
        for entry in &entries {
            if seen.insert(entry.audio_id) {
                distinct.push(entry.audio_id);
            }
        }

        let answers = join_all(distinct.iter().map(|&id| oracle.audio_exists(id))).await;
        let mut exists = HashMap::with_capacity(distinct.len());
        for (id, answer) in distinct.into_iter().zip(answers) {
            exists.insert(id, answer?);
        }

        let missing = detect_missing(&entries, |id| exists.get(&id).copied().unwrap_or(false));
        debug!(
            playlist_id,
            entries = entries.len(),
            missing = missing.len(),
            "Playlist integrity detection finished"
        );
        Ok(PlaylistIntegrityReport::detected(playlist_id, missing))
    }

    /// Remove dangling entries from a playlist
    ///
    /// Fails with `InvalidTarget` before any request when the playlist id is
    /// unresolvable. An empty `missing_ids` is already a clean playlist and
    /// issues no request. On success the playlist view and the audio-file
    /// listings are invalidated.
    pub async fn clean(
        &self,
        playlist_id: Option<i64>,
        missing_ids: Vec<i64>,
    ) -> Result<PlaylistIntegrityReport> {
        let playlist_id = resolve_target(playlist_id)?;
        if missing_ids.is_empty() {
            debug!(playlist_id, "No missing references; skipping cleanup request");
            return Ok(PlaylistIntegrityReport::cleaned(playlist_id, missing_ids, 0));
        }

        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            playlist_id,
            missing = missing_ids.len(),
            "Requesting playlist cleanup"
        );

        let removed = match self.store.clean_playlist(playlist_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(%request_id, playlist_id, error = %e, "Playlist cleanup failed");
                return Err(e);
            }
        };

        if removed < missing_ids.len() as u64 {
            debug!(
                %request_id,
                playlist_id,
                removed,
                expected = missing_ids.len(),
                "Fewer entries removed than detected (playlist changed concurrently or already clean)"
            );
        }
        info!(%request_id, playlist_id, removed, "Playlist cleanup succeeded");

        self.events
            .emit_lossy(SbnEvent::cache_invalidated(playlist_cache_key(playlist_id)));
        self.events
            .emit_lossy(SbnEvent::cache_invalidated(AUDIO_FILES_CACHE_KEY));

        Ok(PlaylistIntegrityReport::cleaned(playlist_id, missing_ids, removed))
    }
}

/// In-flight guard for cleanup call sites, one state per playlist
///
/// Cleanups of different playlists proceed independently; a second cleanup
/// of the same playlist is rejected while the first is `Requesting`.
#[derive(Clone, Default)]
pub struct CleanupTracker {
    states: Arc<Mutex<HashMap<i64, CleanupState>>>,
    events: Option<EventBus>,
}

impl CleanupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish every state change on `events`
    pub fn with_events(events: EventBus) -> Self {
        Self {
            states: Arc::default(),
            events: Some(events),
        }
    }

    pub fn state(&self, playlist_id: i64) -> CleanupState {
        self.lock().get(&playlist_id).cloned().unwrap_or_default()
    }

    /// Enter `Requesting` for `playlist_id`
    ///
    /// The returned ticket must be resolved with `succeed` or `fail`; dropping
    /// it unresolved (e.g. the request future was cancelled) records `Failed`.
    pub fn begin(&self, playlist_id: i64) -> Result<CleanupTicket> {
        let state = {
            let mut states = self.lock();
            let state = states.entry(playlist_id).or_default();
            state.begin(playlist_id)?;
            state.clone()
        };
        self.publish(playlist_id, state);
        Ok(CleanupTicket {
            tracker: self.clone(),
            playlist_id,
            resolved: false,
        })
    }

    fn finish(&self, playlist_id: i64, apply: impl FnOnce(&mut CleanupState)) {
        let state = {
            let mut states = self.lock();
            let state = states.entry(playlist_id).or_default();
            apply(state);
            state.clone()
        };
        self.publish(playlist_id, state);
    }

    /// Drop all tracking for `playlist_id`; it reads as `Idle` again
    fn forget(&self, playlist_id: i64) {
        self.lock().remove(&playlist_id);
        self.publish(playlist_id, CleanupState::Idle);
    }

    fn publish(&self, playlist_id: i64, state: CleanupState) {
        if let Some(events) = &self.events {
            events.emit_lossy(SbnEvent::CleanupStateChanged {
                playlist_id,
                state,
                timestamp: crate::time::now(),
            });
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, CleanupState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outstanding cleanup of one playlist
pub struct CleanupTicket {
    tracker: CleanupTracker,
    playlist_id: i64,
    resolved: bool,
}

impl CleanupTicket {
    pub fn playlist_id(&self) -> i64 {
        self.playlist_id
    }

    pub fn succeed(mut self, report: PlaylistIntegrityReport) {
        self.resolved = true;
        self.tracker.finish(self.playlist_id, |s| s.succeed(report));
    }

    /// Record `Failed`; a playlist that does not exist is forgotten instead
    pub fn fail(mut self, error: &Error) {
        self.resolved = true;
        if matches!(error, Error::NotFound(_)) {
            self.tracker.forget(self.playlist_id);
            return;
        }
        let message = failure_message(error);
        self.tracker.finish(self.playlist_id, |s| s.fail(message));
    }

    /// Resolve from an outcome, passing the outcome through
    pub fn resolve(
        self,
        outcome: Result<PlaylistIntegrityReport>,
    ) -> Result<PlaylistIntegrityReport> {
        match &outcome {
            Ok(report) => self.succeed(report.clone()),
            Err(e) => self.fail(e),
        }
        outcome
    }
}

impl Drop for CleanupTicket {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(playlist_id = self.playlist_id, "Cleanup request abandoned before completion");
            self.tracker
                .finish(self.playlist_id, |s| s.fail("cleanup request cancelled"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::Notification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory playlist store mirroring server-side cleanup semantics
    struct MemoryStore {
        playlists: Mutex<HashMap<i64, Vec<i64>>>,
        stored_audio: HashSet<i64>,
        clean_requests: AtomicUsize,
        fail_with: Option<String>,
    }

    impl MemoryStore {
        fn new(playlists: &[(i64, &[i64])], stored_audio: &[i64]) -> Self {
            Self {
                playlists: Mutex::new(
                    playlists.iter().map(|(id, items)| (*id, items.to_vec())).collect(),
                ),
                stored_audio: stored_audio.iter().copied().collect(),
                clean_requests: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn requests(&self) -> usize {
            self.clean_requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlaylistStore for MemoryStore {
        async fn playlist_entries(&self, playlist_id: i64) -> Result<Vec<PlaylistEntry>> {
            let playlists = self.playlists.lock().unwrap();
            let items = playlists
                .get(&playlist_id)
                .ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_id)))?;
            Ok(items.iter().map(|&audio_id| PlaylistEntry { audio_id }).collect())
        }

        async fn clean_playlist(&self, playlist_id: i64) -> Result<u64> {
            self.clean_requests.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_with {
                return Err(Error::Transport(msg.clone()));
            }
            let mut playlists = self.playlists.lock().unwrap();
            let items = playlists
                .get_mut(&playlist_id)
                .ok_or_else(|| Error::Transport("HTTP 404".to_string()))?;
            let before = items.len();
            items.retain(|id| self.stored_audio.contains(id));
            Ok((before - items.len()) as u64)
        }
    }

    #[async_trait]
    impl AudioOracle for MemoryStore {
        async fn audio_exists(&self, audio_id: i64) -> Result<bool> {
            Ok(self.stored_audio.contains(&audio_id))
        }
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(Some(42)).unwrap(), 42);
        assert!(matches!(resolve_target(None), Err(Error::InvalidTarget(_))));
        assert!(matches!(resolve_target(Some(0)), Err(Error::InvalidTarget(_))));
        assert!(matches!(resolve_target(Some(-3)), Err(Error::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_playlist_42() {
        let store = MemoryStore::new(&[(42, &[1, 2, 3])], &[1, 3]);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let reconciler = Reconciler::new(store, bus);

        let detected = reconciler.detect(Some(42), reconciler.store()).await.unwrap();
        assert_eq!(detected.missing_reference_ids, vec![2]);

        let outcome = reconciler.clean(Some(42), detected.missing_reference_ids).await;
        let report = outcome.as_ref().unwrap();
        assert_eq!(report.removed_count, 1);
        assert_eq!(report.playlist_id, Some(42));

        let notification = Notification::for_outcome(&outcome);
        assert_eq!(notification.description, "Đã loại bỏ 1 file âm thanh không hợp lệ");

        let mut keys = Vec::new();
        while let Ok(SbnEvent::CacheInvalidated { key, .. }) = rx.try_recv() {
            keys.push(key);
        }
        assert_eq!(keys, vec!["playlist:42".to_string(), "audio-files:*".to_string()]);
    }

    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let store = MemoryStore::new(&[(7, &[4, 5, 4, 6])], &[6]);
        let reconciler = Reconciler::new(store, EventBus::new(16));

        let first = reconciler.clean(Some(7), vec![4, 5, 4]).await.unwrap();
        assert_eq!(first.removed_count, 3);

        let second = reconciler.clean(Some(7), vec![4, 5, 4]).await.unwrap();
        assert_eq!(second.removed_count, 0);
        assert_eq!(reconciler.store().requests(), 2);
    }

    #[tokio::test]
    async fn test_clean_without_target_issues_no_request() {
        let store = MemoryStore::new(&[(1, &[5])], &[]);
        let reconciler = Reconciler::new(store, EventBus::new(16));

        let result = reconciler.clean(None, vec![5]).await;
        assert!(matches!(result, Err(Error::InvalidTarget(_))));
        assert_eq!(reconciler.store().requests(), 0);
    }

    #[tokio::test]
    async fn test_clean_with_nothing_missing_skips_request() {
        let store = MemoryStore::new(&[(1, &[5])], &[5]);
        let reconciler = Reconciler::new(store, EventBus::new(16));

        let report = reconciler.clean(Some(1), vec![]).await.unwrap();
        assert!(report.is_intact());
        assert_eq!(report.removed_count, 0);
        assert_eq!(reconciler.store().requests(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_and_skips_invalidation() {
        let mut store = MemoryStore::new(&[(3, &[1])], &[]);
        store.fail_with = Some("HTTP 503: unavailable".to_string());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let reconciler = Reconciler::new(store, bus);

        let outcome = reconciler.clean(Some(3), vec![1]).await;
        assert!(matches!(outcome, Err(Error::Transport(_))));
        assert!(rx.try_recv().is_err());

        let notification = Notification::for_outcome(&outcome);
        assert_eq!(notification.description, "HTTP 503: unavailable");
    }

    #[tokio::test]
    async fn test_detect_keeps_duplicates_and_queries_once_per_id() {
        struct CountingOracle {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl AudioOracle for CountingOracle {
            async fn audio_exists(&self, audio_id: i64) -> Result<bool> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(audio_id != 7)
            }
        }

        let store = MemoryStore::new(&[(9, &[7, 1, 7])], &[]);
        let reconciler = Reconciler::new(store, EventBus::new(16));
        let oracle = CountingOracle {
            calls: AtomicUsize::new(0),
        };

        let report = reconciler.detect(Some(9), &oracle).await.unwrap();
        assert_eq!(report.missing_reference_ids, vec![7, 7]);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tracker_rejects_reentry_per_playlist() {
        let tracker = CleanupTracker::new();
        let ticket = tracker.begin(42).unwrap();
        assert!(tracker.state(42).is_requesting());
        assert!(matches!(tracker.begin(42), Err(Error::CleanupInProgress(42))));

        // Other playlists are independent
        let other = tracker.begin(43).unwrap();
        other.succeed(PlaylistIntegrityReport::cleaned(43, vec![], 0));

        ticket.fail(&Error::Transport(String::new()));
        assert_eq!(
            tracker.state(42),
            CleanupState::Failed {
                message: crate::integrity::UNKNOWN_ERROR_MESSAGE.to_string()
            }
        );
        // Guard released: manual retry allowed
        assert!(tracker.begin(42).is_ok());
    }

    #[test]
    fn test_dropped_ticket_records_failure() {
        let tracker = CleanupTracker::new();
        {
            let _ticket = tracker.begin(5).unwrap();
        }
        assert!(matches!(tracker.state(5), CleanupState::Failed { .. }));
        assert!(tracker.begin(5).is_ok());
    }

    #[test]
    fn test_unknown_playlist_is_not_tracked() {
        let tracker = CleanupTracker::new();
        for playlist_id in 100..110 {
            let ticket = tracker.begin(playlist_id).unwrap();
            ticket.fail(&Error::NotFound(format!("playlist {}", playlist_id)));
        }
        assert!(tracker.lock().is_empty());
        assert_eq!(tracker.state(100), CleanupState::Idle);

        // Other failures are still remembered
        let ticket = tracker.begin(42).unwrap();
        ticket.fail(&Error::Transport("HTTP 503".to_string()));
        assert_eq!(tracker.lock().len(), 1);
    }

    #[test]
    fn test_tracker_publishes_state_changes() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let tracker = CleanupTracker::with_events(bus);

        let ticket = tracker.begin(8).unwrap();
        ticket.succeed(PlaylistIntegrityReport::cleaned(8, vec![1], 1));

        let states: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(states, vec!["CleanupStateChanged", "CleanupStateChanged"]);
        assert_eq!(tracker.state(8), CleanupState::Succeeded {
            report: PlaylistIntegrityReport::cleaned(8, vec![1], 1)
        });
    }
}
