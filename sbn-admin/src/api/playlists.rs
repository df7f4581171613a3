//! Playlist integrity endpoints
//!
//! Detection is read-only. Cleanup runs under the per-playlist in-flight
//! guard: a second cleanup of the same playlist is refused with 409 until
//! the first one resolves. Every cleanup outcome is also published as a
//! notification event.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use sbn_common::events::SbnEvent;
use sbn_common::integrity::Notification;
use sbn_common::reconciler::resolve_target;
use sbn_common::{CleanupState, Error, PlaylistIntegrityReport};

use crate::{ApiError, AppState};

/// Optional cleanup body; without `missingIds` a detection pass runs first
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRequest {
    pub missing_ids: Option<Vec<i64>>,
}

impl CleanRequest {
    /// Parse an optional request body
    ///
    /// An empty body means "detect first". Anything else must be a valid
    /// request, whatever the content type says.
    pub fn from_body(body: &[u8]) -> sbn_common::Result<Option<Self>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("invalid cleanup request body: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub report: PlaylistIntegrityReport,
    pub notification: Notification,
}

/// GET /api/playlists/:id/integrity
pub async fn check_integrity(
    State(state): State<AppState>,
    Path(playlist_id): Path<i64>,
) -> Result<Json<PlaylistIntegrityReport>, ApiError> {
    let report = state
        .reconciler
        .detect(Some(playlist_id), state.client())
        .await?;
    Ok(Json(report))
}

/// POST /api/playlists/:id/clean
pub async fn clean_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<i64>,
    body: Bytes,
) -> Result<Json<CleanResponse>, ApiError> {
    let playlist_id = resolve_target(Some(playlist_id))?;
    let missing_ids = CleanRequest::from_body(&body)?.and_then(|request| request.missing_ids);
    let ticket = state.cleanups.begin(playlist_id)?;

    let outcome = match missing_ids {
        Some(ids) => state.reconciler.clean(Some(playlist_id), ids).await,
        None => match state
            .reconciler
            .detect(Some(playlist_id), state.client())
            .await
        {
            Ok(report) => {
                state
                    .reconciler
                    .clean(Some(playlist_id), report.missing_reference_ids)
                    .await
            }
            Err(e) => Err(e),
        },
    };

    let outcome = ticket.resolve(outcome);
    let notification = Notification::for_outcome(&outcome);
    state
        .events
        .emit_lossy(SbnEvent::notification(notification.clone()));

    match outcome {
        Ok(report) => {
            info!(
                playlist_id,
                removed = report.removed_count,
                "Playlist cleanup finished"
            );
            Ok(Json(CleanResponse {
                report,
                notification,
            }))
        }
        Err(e) => Err(ApiError::with_notification(e, notification)),
    }
}

/// GET /api/playlists/:id/clean/state
pub async fn cleanup_state(
    State(state): State<AppState>,
    Path(playlist_id): Path<i64>,
) -> Json<CleanupState> {
    Json(state.cleanups.state(playlist_id))
}
