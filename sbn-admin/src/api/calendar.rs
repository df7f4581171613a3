//! Broadcast calendar endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use sbn_common::calendar::{month_grid, next_month, previous_month, DayClassification};
use sbn_common::Error;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// Any date inside the month to show; today when absent
    pub anchor: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDayView {
    pub date: NaiveDate,
    pub classification: DayClassification,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    /// "YYYY-MM"
    pub month: String,
    pub anchor: NaiveDate,
    /// Blank cells before the 1st in a Sunday-first week layout
    pub first_weekday: u32,
    pub previous: NaiveDate,
    pub next: NaiveDate,
    pub days: Vec<CalendarDayView>,
}

/// GET /api/calendar?anchor=YYYY-MM-DD
pub async fn get_calendar(
    State(state): State<AppState>,
    query: Result<Query<CalendarQuery>, QueryRejection>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let Query(query) = query.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let anchor = query.anchor.unwrap_or_else(sbn_common::time::today);
    let grid = month_grid(anchor);

    let calendar = state
        .client()
        .broadcast_calendar(grid.first(), grid.last())
        .await?;

    let days = grid
        .classify(&calendar.broadcast, &calendar.scheduled)
        .into_iter()
        .map(|(date, classification)| CalendarDayView {
            date,
            classification,
        })
        .collect();

    Ok(Json(CalendarResponse {
        month: grid.first().format("%Y-%m").to_string(),
        anchor,
        first_weekday: grid.leading_padding(Weekday::Sun),
        previous: previous_month(anchor),
        next: next_month(anchor),
        days,
    }))
}
