//! # SBN Common Library
//!
//! Shared code for the store broadcast network admin services including:
//! - Frequency rule engine (per-group injection scheduling)
//! - Calendar day classification
//! - Playlist integrity detection and cleanup orchestration
//! - Event types (SbnEvent enum) and EventBus
//! - Configuration loading
//! - Database persistence of frequency rules

pub mod calendar;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod frequency;
pub mod integrity;
pub mod reconciler;
pub mod time;

pub use error::{Error, Result};
pub use frequency::{FrequencyRule, FrequencySettings};
pub use integrity::{CleanupState, PlaylistIntegrityReport};
