//! Frequency rule endpoints
//!
//! A PATCH carries raw editor input. Numeric fields go through the rule's
//! clamping setters, so out-of-range or non-numeric values are corrected
//! rather than rejected. Only a malformed time of day is a client error.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use sbn_common::db::{load_frequency_rule, load_frequency_rules, update_frequency_rule};
use sbn_common::events::SbnEvent;
use sbn_common::frequency::{parse_time_of_day, validate_group_name};
use sbn_common::{FrequencyRule, FrequencySettings};

use crate::{ApiError, AppState};

/// Raw editor value: a JSON number or whatever the user typed
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Number(serde_json::Number),
    Text(String),
}

impl RawInput {
    fn as_text(&self) -> String {
        match self {
            RawInput::Number(n) => n.to_string(),
            RawInput::Text(s) => s.clone(),
        }
    }
}

/// Partial rule update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEdit {
    pub enabled: Option<bool>,
    pub frequency: Option<RawInput>,
    pub max_plays: Option<RawInput>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl RuleEdit {
    /// Apply to `rule`; fails only on an unparseable time of day
    pub fn apply(self, rule: FrequencyRule) -> sbn_common::Result<FrequencyRule> {
        // Parse both times before touching anything
        let start_time = self.start_time.as_deref().map(parse_time_of_day).transpose()?;
        let end_time = self.end_time.as_deref().map(parse_time_of_day).transpose()?;

        let mut rule = rule;
        if let Some(enabled) = self.enabled {
            rule = rule.set_enabled(enabled);
        }
        if let Some(raw) = &self.frequency {
            rule = rule.set_frequency(&raw.as_text());
        }
        if let Some(raw) = &self.max_plays {
            rule = rule.set_max_plays(&raw.as_text());
        }
        if let Some(start_time) = start_time {
            rule = rule.set_start_time(start_time);
        }
        if let Some(end_time) = end_time {
            rule = rule.set_end_time(end_time);
        }
        Ok(rule)
    }
}

/// GET /api/frequency-rules
pub async fn list_rules(State(state): State<AppState>) -> Result<Json<FrequencySettings>, ApiError> {
    let settings = load_frequency_rules(&state.db).await?;
    Ok(Json(settings))
}

/// GET /api/frequency-rules/:group
///
/// A group never configured reads as the default rule.
pub async fn get_rule(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<FrequencyRule>, ApiError> {
    validate_group_name(&group)?;
    let rule = load_frequency_rule(&state.db, &group)
        .await?
        .unwrap_or_default();
    Ok(Json(rule))
}

/// PATCH /api/frequency-rules/:group
///
/// Load, edit and save run in one transaction.
pub async fn update_rule(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Json(edit): Json<RuleEdit>,
) -> Result<Json<FrequencyRule>, ApiError> {
    let rule = update_frequency_rule(&state.db, &group, |current| edit.apply(current)).await?;

    info!(
        group = %group,
        enabled = rule.enabled(),
        frequency_minutes = rule.frequency_minutes(),
        max_plays = rule.max_plays(),
        "Frequency rule updated"
    );

    state.events.emit_lossy(SbnEvent::FrequencyRuleUpdated {
        group,
        rule,
        timestamp: sbn_common::time::now(),
    });

    Ok(Json(rule))
}
