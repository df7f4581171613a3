//! Playlist integrity types and detection
//!
//! Pure half of playlist reconciliation: finding entries whose audio no
//! longer resolves, the report shape, user-facing notification payloads and
//! the call-site cleanup state machine. The effectful half lives in
//! [`crate::reconciler`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fallback description when a failure carries no usable message
pub const UNKNOWN_ERROR_MESSAGE: &str = "Lỗi không xác định";

/// Anything in a playlist that references one audio file
pub trait AudioReference {
    fn audio_id(&self) -> i64;
}

impl AudioReference for i64 {
    fn audio_id(&self) -> i64 {
        *self
    }
}

/// One playlist entry as reported by the playlist store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub audio_id: i64,
}

impl AudioReference for PlaylistEntry {
    fn audio_id(&self) -> i64 {
        self.audio_id
    }
}

/// Audio ids whose files no longer exist, in playlist order
///
/// Duplicates are kept: an id referenced twice and missing appears twice.
pub fn detect_missing<E, F>(entries: &[E], mut exists: F) -> Vec<i64>
where
    E: AudioReference,
    F: FnMut(i64) -> bool,
{
    entries
        .iter()
        .map(AudioReference::audio_id)
        .filter(|id| !exists(*id))
        .collect()
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistIntegrityReport {
    pub playlist_id: Option<i64>,
    pub missing_reference_ids: Vec<i64>,
    pub removed_count: u64,
}

impl PlaylistIntegrityReport {
    /// Detection-only report (nothing removed yet)
    pub fn detected(playlist_id: i64, missing_reference_ids: Vec<i64>) -> Self {
        Self {
            playlist_id: Some(playlist_id),
            missing_reference_ids,
            removed_count: 0,
        }
    }

    /// Report after the store acknowledged a cleanup
    pub fn cleaned(playlist_id: i64, missing_reference_ids: Vec<i64>, removed_count: u64) -> Self {
        Self {
            playlist_id: Some(playlist_id),
            missing_reference_ids,
            removed_count,
        }
    }

    /// True when no missing references were found
    pub fn is_intact(&self) -> bool {
        self.missing_reference_ids.is_empty()
    }
}

/// Visual style of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Destructive,
}

/// User-facing summary of a cleanup outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn cleanup_succeeded(removed_count: u64) -> Self {
        Self {
            title: "Thành công".to_string(),
            description: format!("Đã loại bỏ {} file âm thanh không hợp lệ", removed_count),
            variant: NotificationVariant::Success,
        }
    }

    pub fn cleanup_failed(error: &Error) -> Self {
        Self {
            title: "Lỗi".to_string(),
            description: failure_message(error),
            variant: NotificationVariant::Destructive,
        }
    }

    /// Notification for either outcome of a cleanup
    pub fn for_outcome(outcome: &Result<PlaylistIntegrityReport>) -> Self {
        match outcome {
            Ok(report) => Self::cleanup_succeeded(report.removed_count),
            Err(e) => Self::cleanup_failed(e),
        }
    }
}

/// Message shown for a failed cleanup
///
/// Uses the underlying message when there is one, otherwise the generic
/// unknown-error text.
pub fn failure_message(error: &Error) -> String {
    let message = match error {
        Error::Transport(msg) | Error::InvalidTarget(msg) => msg.clone(),
        other => other.to_string(),
    };
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

/// Call-site state of a cleanup invocation
///
/// `Idle -> Requesting -> {Succeeded, Failed}`; a terminal state may start a
/// new request, `Requesting` may not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CleanupState {
    #[default]
    Idle,
    Requesting {
        started_at: DateTime<Utc>,
    },
    Succeeded {
        report: PlaylistIntegrityReport,
    },
    /// Final playlist state is unknown; re-query before retrying
    Failed {
        message: String,
    },
}

impl CleanupState {
    pub fn is_requesting(&self) -> bool {
        matches!(self, CleanupState::Requesting { .. })
    }

    /// Enter `Requesting`; rejected while a request is outstanding
    pub fn begin(&mut self, playlist_id: i64) -> Result<()> {
        if self.is_requesting() {
            return Err(Error::CleanupInProgress(playlist_id));
        }
        *self = CleanupState::Requesting {
            started_at: crate::time::now(),
        };
        Ok(())
    }

    pub fn succeed(&mut self, report: PlaylistIntegrityReport) {
        *self = CleanupState::Succeeded { report };
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        *self = CleanupState::Failed {
            message: message.into(),
        };
    }
}
