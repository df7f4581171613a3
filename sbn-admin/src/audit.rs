//! Periodic playlist integrity audit
//!
//! Detection only: the audit reports missing references but never removes
//! anything. Removal stays an explicit user action.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sbn_common::config::AuditConfig;
use sbn_common::events::{EventBus, SbnEvent};
use sbn_common::reconciler::{AudioOracle, PlaylistStore, Reconciler};

/// Spawn the audit loop, `None` when disabled or nothing to audit
pub fn spawn_audit_task<S>(
    reconciler: Arc<Reconciler<S>>,
    events: EventBus,
    config: AuditConfig,
) -> Option<JoinHandle<()>>
where
    S: PlaylistStore + AudioOracle + 'static,
{
    if !config.enabled {
        info!("Playlist integrity audit disabled");
        return None;
    }
    if config.playlist_ids.is_empty() {
        warn!("Playlist integrity audit enabled but no playlist_ids configured");
        return None;
    }

    let period = Duration::from_secs(config.interval_secs.max(1));
    info!(
        playlists = config.playlist_ids.len(),
        interval_secs = period.as_secs(),
        "Starting playlist integrity audit"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            run_audit_pass(&reconciler, &events, &config.playlist_ids).await;
        }
    }))
}

/// Audit each playlist once; returns how many have missing references
///
/// A failure on one playlist is logged and does not stop the pass.
pub async fn run_audit_pass<S>(
    reconciler: &Reconciler<S>,
    events: &EventBus,
    playlist_ids: &[i64],
) -> usize
where
    S: PlaylistStore + AudioOracle,
{
    let mut damaged = 0;
    for &playlist_id in playlist_ids {
        match reconciler.detect(Some(playlist_id), reconciler.store()).await {
            Ok(report) => {
                if !report.is_intact() {
                    damaged += 1;
                    warn!(
                        playlist_id,
                        missing = report.missing_reference_ids.len(),
                        "Playlist references missing audio files"
                    );
                }
                events.emit_lossy(SbnEvent::IntegrityAuditCompleted {
                    playlist_id,
                    missing_reference_ids: report.missing_reference_ids,
                    timestamp: sbn_common::time::now(),
                });
            }
            Err(e) => warn!(playlist_id, "Integrity audit failed: {}", e),
        }
    }
    damaged
}
