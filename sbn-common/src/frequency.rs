//! Frequency rule engine
//!
//! Per-group scheduling configuration (enabled flag, interval, cap, active
//! window) and the pure decision function that says whether an insertion of
//! a group is due at a given clock tick.
//!
//! # Clamping
//!
//! Numeric rule fields are edited through raw text (the editing surface may
//! hold an empty or half-typed value). The setters never fail:
//! - unparseable or non-positive input falls back to the field default
//! - positive input outside the domain is clamped to the nearest bound
//!
//! # Active windows
//!
//! `start_time..end_time` is inclusive-exclusive. When `start_time` is later
//! than `end_time` the window wraps midnight (e.g. 22:00–02:00). Equal
//! bounds mean the group is active around the clock.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Default spacing between insertions (minutes)
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 30;
/// Lower bound of `frequency_minutes`
pub const MIN_FREQUENCY_MINUTES: u32 = 5;
/// Upper bound of `frequency_minutes`
pub const MAX_FREQUENCY_MINUTES: u32 = 120;

/// Default cap of insertions per active window
pub const DEFAULT_MAX_PLAYS: u32 = 10;
/// Lower bound of `max_plays`
pub const MIN_MAX_PLAYS: u32 = 1;
/// Upper bound of `max_plays`
pub const MAX_MAX_PLAYS: u32 = 50;

/// Well-known content groups
pub const GROUP_ADS: &str = "ads";
pub const GROUP_MUSIC: &str = "music";
pub const GROUP_ANNOUNCEMENTS: &str = "announcements";

/// Time-of-day wire format
const TIME_FORMAT: &str = "%H:%M";

/// Scheduling rule for one content group
///
/// Fields are private so every construction path goes through clamping;
/// deserialized rules are normalized the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FrequencyRuleRepr", into = "FrequencyRuleRepr")]
pub struct FrequencyRule {
    enabled: bool,
    frequency_minutes: u32,
    max_plays: u32,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl Default for FrequencyRule {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_minutes: DEFAULT_FREQUENCY_MINUTES,
            max_plays: DEFAULT_MAX_PLAYS,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl FrequencyRule {
    /// Build a rule from already-numeric values, clamping them into domain
    pub fn new(
        enabled: bool,
        frequency_minutes: i64,
        max_plays: i64,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            enabled,
            frequency_minutes: normalize_frequency(frequency_minutes),
            max_plays: normalize_max_plays(max_plays),
            start_time,
            end_time,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn frequency_minutes(&self) -> u32 {
        self.frequency_minutes
    }

    pub fn max_plays(&self) -> u32 {
        self.max_plays
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    /// Toggle the group on or off
    ///
    /// Disabling keeps the remaining fields so re-enabling restores the
    /// previous tuning.
    #[must_use]
    pub fn set_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    /// Replace the interval from raw editor input (default 30, domain [5,120])
    #[must_use]
    pub fn set_frequency(self, raw_input: &str) -> Self {
        let frequency_minutes = match parse_positive(raw_input) {
            Some(value) => clamp_u32(value, MIN_FREQUENCY_MINUTES, MAX_FREQUENCY_MINUTES),
            None => DEFAULT_FREQUENCY_MINUTES,
        };
        Self {
            frequency_minutes,
            ..self
        }
    }

    /// Replace the play cap from raw editor input (default 10, domain [1,50])
    #[must_use]
    pub fn set_max_plays(self, raw_input: &str) -> Self {
        let max_plays = match parse_positive(raw_input) {
            Some(value) => clamp_u32(value, MIN_MAX_PLAYS, MAX_MAX_PLAYS),
            None => DEFAULT_MAX_PLAYS,
        };
        Self { max_plays, ..self }
    }

    /// Replace the window start; no ordering check against `end_time`
    #[must_use]
    pub fn set_start_time(self, start_time: NaiveTime) -> Self {
        Self { start_time, ..self }
    }

    /// Replace the window end; no ordering check against `start_time`
    #[must_use]
    pub fn set_end_time(self, end_time: NaiveTime) -> Self {
        Self { end_time, ..self }
    }

    /// Whether the window wraps midnight
    pub fn is_overnight(&self) -> bool {
        self.start_time > self.end_time
    }

    /// Whether `time` falls inside the active window
    pub fn is_within_window(&self, time: NaiveTime) -> bool {
        match self.start_time.cmp(&self.end_time) {
            Ordering::Less => time >= self.start_time && time < self.end_time,
            Ordering::Greater => time >= self.start_time || time < self.end_time,
            Ordering::Equal => true,
        }
    }

    /// Start of the window occurrence containing `now`
    ///
    /// For an overnight window, 01:30 belongs to the occurrence that opened
    /// the previous evening. Returns `None` outside the window.
    pub fn window_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.is_within_window(now.time()) {
            return None;
        }
        let opened_today = now.date().and_time(self.start_time);
        if now.time() >= self.start_time {
            Some(opened_today)
        } else {
            opened_today.checked_sub_signed(Duration::days(1))
        }
    }

    /// Scheduling decision for one clock tick
    ///
    /// Due iff the rule is enabled, `now` is inside the window, fewer than
    /// `max_plays` insertions happened in this window occurrence, and at least
    /// `frequency_minutes` elapsed since the last insertion (or none yet).
    pub fn is_due(
        &self,
        now: NaiveDateTime,
        last_fired_at: Option<NaiveDateTime>,
        plays_so_far_today: u32,
    ) -> bool {
        if !self.enabled || !self.is_within_window(now.time()) {
            return false;
        }
        if plays_so_far_today >= self.max_plays {
            return false;
        }
        match last_fired_at {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    >= Duration::minutes(i64::from(self.frequency_minutes))
            }
        }
    }
}

/// Parse "HH:MM" (seconds accepted and dropped)
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map(|t| NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t))
        .map_err(|_| Error::InvalidInput(format!("time of day must be HH:MM, got '{}'", value)))
}

/// Format a time of day as "HH:MM"
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_positive(raw_input: &str) -> Option<i64> {
    raw_input.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

fn clamp_u32(value: i64, min: u32, max: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(max)) as u32
}

fn normalize_frequency(value: i64) -> u32 {
    if value > 0 {
        clamp_u32(value, MIN_FREQUENCY_MINUTES, MAX_FREQUENCY_MINUTES)
    } else {
        DEFAULT_FREQUENCY_MINUTES
    }
}

fn normalize_max_plays(value: i64) -> u32 {
    if value > 0 {
        clamp_u32(value, MIN_MAX_PLAYS, MAX_MAX_PLAYS)
    } else {
        DEFAULT_MAX_PLAYS
    }
}

/// Wire representation (camelCase, "HH:MM" times)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrequencyRuleRepr {
    enabled: bool,
    frequency: i64,
    max_plays: i64,
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
}

impl From<FrequencyRuleRepr> for FrequencyRule {
    fn from(repr: FrequencyRuleRepr) -> Self {
        FrequencyRule::new(
            repr.enabled,
            repr.frequency,
            repr.max_plays,
            repr.start_time,
            repr.end_time,
        )
    }
}

impl From<FrequencyRule> for FrequencyRuleRepr {
    fn from(rule: FrequencyRule) -> Self {
        Self {
            enabled: rule.enabled,
            frequency: i64::from(rule.frequency_minutes),
            max_plays: i64::from(rule.max_plays),
            start_time: rule.start_time,
            end_time: rule.end_time,
        }
    }
}

/// Serde adapter for "HH:MM" time-of-day strings
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time_of_day(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}

/// Check that a group name is usable as a persistence key
pub fn validate_group_name(group: &str) -> Result<()> {
    let valid = !group.is_empty()
        && group.len() <= 64
        && group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid group name: '{}'", group)))
    }
}

/// Settings object for all groups, keyed by group name
///
/// Holds the editing-session copy of each rule. A group that has never
/// been configured reads as the default rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencySettings {
    rules: BTreeMap<String, FrequencyRule>,
}

impl FrequencySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule for `group`, or the default rule if unconfigured
    pub fn get(&self, group: &str) -> FrequencyRule {
        self.rules.get(group).copied().unwrap_or_default()
    }

    pub fn contains(&self, group: &str) -> bool {
        self.rules.contains_key(group)
    }

    pub fn insert(&mut self, group: impl Into<String>, rule: FrequencyRule) {
        self.rules.insert(group.into(), rule);
    }

    /// Apply a pure update to one group's rule and store the result
    ///
    /// Creates the group with defaults first if needed.
    pub fn update<F>(&mut self, group: &str, edit: F) -> FrequencyRule
    where
        F: FnOnce(FrequencyRule) -> FrequencyRule,
    {
        let updated = edit(self.get(group));
        self.rules.insert(group.to_string(), updated);
        updated
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrequencyRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Per-group insertion bookkeeping for a running broadcast
///
/// Tracks the last insertion and the play count of the current window
/// occurrence; the count resets when a new occurrence opens.
#[derive(Debug, Clone, Default)]
pub struct InsertionTracker {
    last_fired_at: Option<NaiveDateTime>,
    window_start: Option<NaiveDateTime>,
    plays_in_window: u32,
}

impl InsertionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fired_at(&self) -> Option<NaiveDateTime> {
        self.last_fired_at
    }

    /// Plays already counted against the window occurrence containing `now`
    pub fn plays_in_window(&self, rule: &FrequencyRule, now: NaiveDateTime) -> u32 {
        match (rule.window_start(now), self.window_start) {
            (Some(current), Some(recorded)) if current == recorded => self.plays_in_window,
            _ => 0,
        }
    }

    pub fn is_due(&self, rule: &FrequencyRule, now: NaiveDateTime) -> bool {
        rule.is_due(now, self.last_fired_at, self.plays_in_window(rule, now))
    }

    /// Record an insertion at `at`
    pub fn record(&mut self, rule: &FrequencyRule, at: NaiveDateTime) {
        let plays = self.plays_in_window(rule, at);
        self.window_start = rule.window_start(at);
        self.plays_in_window = plays.saturating_add(1);
        self.last_fired_at = Some(at);
    }

    /// Record an insertion if one is due; returns whether it fired
    pub fn try_fire(&mut self, rule: &FrequencyRule, now: NaiveDateTime) -> bool {
        if self.is_due(rule, now) {
            self.record(rule, now);
            true
        } else {
            false
        }
    }
}
