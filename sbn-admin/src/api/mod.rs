//! HTTP API handlers

pub mod calendar;
pub mod frequency;
pub mod health;
pub mod playlists;
pub mod sse;

pub use calendar::get_calendar;
pub use frequency::{get_rule, list_rules, update_rule};
pub use health::health_routes;
pub use playlists::{check_integrity, clean_playlist, cleanup_state};
pub use sse::event_stream;
