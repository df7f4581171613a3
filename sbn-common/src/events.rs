//! Event types for the SBN event system
//!
//! Provides shared event definitions and the EventBus used to fan events out
//! to SSE clients and in-process listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::frequency::FrequencyRule;
use crate::integrity::{CleanupState, Notification};

/// Cache key prefix for a single playlist view
pub const PLAYLIST_CACHE_PREFIX: &str = "playlist:";
/// Cache key covering every audio-file listing
pub const AUDIO_FILES_CACHE_KEY: &str = "audio-files:*";

/// Cache key of one playlist view
pub fn playlist_cache_key(playlist_id: i64) -> String {
    format!("{}{}", PLAYLIST_CACHE_PREFIX, playlist_id)
}

/// SBN event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SbnEvent {
    /// A cached view became stale and must be re-read
    CacheInvalidated {
        key: String,
        timestamp: DateTime<Utc>,
    },

    /// User-facing notification
    Notification {
        notification: Notification,
        timestamp: DateTime<Utc>,
    },

    /// A group's frequency rule was saved
    FrequencyRuleUpdated {
        group: String,
        rule: FrequencyRule,
        timestamp: DateTime<Utc>,
    },

    /// Call-site cleanup state of a playlist changed
    CleanupStateChanged {
        playlist_id: i64,
        state: CleanupState,
        timestamp: DateTime<Utc>,
    },

    /// Background audit finished one playlist (detection only)
    IntegrityAuditCompleted {
        playlist_id: i64,
        missing_reference_ids: Vec<i64>,
        timestamp: DateTime<Utc>,
    },
}

impl SbnEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            SbnEvent::CacheInvalidated { .. } => "CacheInvalidated",
            SbnEvent::Notification { .. } => "Notification",
            SbnEvent::FrequencyRuleUpdated { .. } => "FrequencyRuleUpdated",
            SbnEvent::CleanupStateChanged { .. } => "CleanupStateChanged",
            SbnEvent::IntegrityAuditCompleted { .. } => "IntegrityAuditCompleted",
        }
    }

    pub fn cache_invalidated(key: impl Into<String>) -> Self {
        SbnEvent::CacheInvalidated {
            key: key.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn notification(notification: Notification) -> Self {
        SbnEvent::Notification {
            notification,
            timestamp: Utc::now(),
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// observe `Lagged` instead of stalling producers, and dropped receivers are
/// cleaned up automatically.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SbnEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SbnEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SbnEvent) -> Result<usize, broadcast::error::SendError<SbnEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SbnEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
