//! Broadcast server HTTP client
//!
//! The broadcast server owns playlists and audio storage. This client is both
//! the [`PlaylistStore`] and the [`AudioOracle`] the reconciler talks to, and
//! supplies the broadcast calendar date sets.
//!
//! Consumed endpoints:
//! - `GET  /api/playlists/{id}` -> `{id, items: [{audioId}]}`
//! - `GET  /api/audio-files/{id}` -> 2xx exists, 404 missing
//! - `POST /api/playlists/{id}/clean` -> `{removedItems}`
//! - `GET  /api/broadcasts/calendar?from=&to=` -> `{broadcastDates, scheduledDates}`

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use sbn_common::calendar::DateSet;
use sbn_common::integrity::PlaylistEntry;
use sbn_common::reconciler::{AudioOracle, PlaylistStore};
use sbn_common::{Error, Result};

const USER_AGENT: &str = concat!("sbn-admin/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResponse {
    #[serde(default)]
    items: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanResponse {
    removed_items: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarResponse {
    #[serde(default)]
    broadcast_dates: Vec<String>,
    #[serde(default)]
    scheduled_dates: Vec<String>,
}

/// Error payload the broadcast server attaches to failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Broadcast and scheduled day sets for a date range
#[derive(Debug, Clone, Default)]
pub struct BroadcastCalendar {
    pub broadcast: DateSet,
    pub scheduled: DateSet,
}

/// Broadcast server API client
pub struct BroadcastServerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BroadcastServerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Broadcast and scheduled days between `from` and `to` inclusive
    ///
    /// Entries may be plain dates or timestamps; time of day is ignored and
    /// unparseable entries are skipped.
    pub async fn broadcast_calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<BroadcastCalendar> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        debug!(from = %from, to = %to, "Querying broadcast calendar");

        let response = self
            .http_client
            .get(self.url("/api/broadcasts/calendar"))
            .query(&[("from", from.as_str()), ("to", to.as_str())])
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        let body: CalendarResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Invalid calendar response: {}", e)))?;

        Ok(BroadcastCalendar {
            broadcast: parse_calendar_entries(&body.broadcast_dates),
            scheduled: parse_calendar_entries(&body.scheduled_dates),
        })
    }
}

#[async_trait]
impl PlaylistStore for BroadcastServerClient {
    async fn playlist_entries(&self, playlist_id: i64) -> Result<Vec<PlaylistEntry>> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/playlists/{}", playlist_id)))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("playlist {}", playlist_id)));
        }

        let response = check_status(response).await?;
        let playlist: PlaylistResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Invalid playlist response: {}", e)))?;

        debug!(playlist_id, entries = playlist.items.len(), "Fetched playlist");
        Ok(playlist.items)
    }

    async fn clean_playlist(&self, playlist_id: i64) -> Result<u64> {
        let response = self
            .http_client
            .post(self.url(&format!("/api/playlists/{}/clean", playlist_id)))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        let body: CleanResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Invalid cleanup response: {}", e)))?;

        info!(
            playlist_id,
            removed_items = body.removed_items,
            "Broadcast server cleaned playlist"
        );
        Ok(body.removed_items)
    }
}

#[async_trait]
impl AudioOracle for BroadcastServerClient {
    async fn audio_exists(&self, audio_id: i64) -> Result<bool> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/audio-files/{}", audio_id)))
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Err(transport_error(status, response).await)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(transport_error(status, response).await)
    }
}

/// Failure carrying the server's own message when it sent one
async fn transport_error(status: StatusCode, response: reqwest::Response) -> Error {
    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text).unwrap_or_else(|| format!("HTTP {}", status));
    warn!(status = status.as_u16(), "Broadcast server request failed: {}", message);
    Error::Transport(message)
}

fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty()),
        Err(_) => Some(body.to_string()),
    }
}

/// Calendar day of one date-ish string
pub fn parse_calendar_entry(entry: &str) -> Option<NaiveDate> {
    let entry = entry.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(entry) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(entry, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(entry, "%Y-%m-%d").ok()
}

fn parse_calendar_entries(entries: &[String]) -> DateSet {
    entries
        .iter()
        .filter_map(|entry| {
            let day = parse_calendar_entry(entry);
            if day.is_none() {
                warn!("Skipping unparseable calendar entry {:?}", entry);
            }
            day
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = BroadcastServerClient::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/api/x"), "http://localhost:8080/api/x");
    }

    #[test]
    fn test_parse_calendar_entry_formats() {
        assert_eq!(parse_calendar_entry("2026-10-05"), Some(date(2026, 10, 5)));
        assert_eq!(
            parse_calendar_entry("2026-10-05T23:30:00+07:00"),
            Some(date(2026, 10, 5))
        );
        assert_eq!(
            parse_calendar_entry("2026-10-05T08:15:00.250"),
            Some(date(2026, 10, 5))
        );
        assert_eq!(parse_calendar_entry("next tuesday"), None);
    }

    #[test]
    fn test_calendar_entries_skip_garbage() {
        let set = parse_calendar_entries(&[
            "2026-10-05".to_string(),
            "oops".to_string(),
            "2026-10-05T10:00:00Z".to_string(),
        ]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&date(2026, 10, 5)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"disk full"}"#), Some("disk full".to_string()));
        assert_eq!(error_message(r#"{"message":"locked"}"#), Some("locked".to_string()));
        assert_eq!(error_message(r#"{"error":""}"#), None);
        assert_eq!(error_message("bad gateway"), Some("bad gateway".to_string()));
        assert_eq!(error_message("  "), None);
    }
}
