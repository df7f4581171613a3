//! Calendar day classification
//!
//! Derived view tagging each calendar date with the broadcast activity it
//! carries. Inputs are externally supplied date sets; membership is tested
//! by date only, so timestamps with a time-of-day component match the day
//! they fall on.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Day-level category for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DayClassification {
    /// At least one broadcast actually aired
    BroadcastDay,
    /// A broadcast is planned but has not aired
    ScheduledDay,
    PlainDay,
}

/// Anything that names a calendar date
pub trait CalendarDay {
    fn calendar_date(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn calendar_date(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_date(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn calendar_date(&self) -> NaiveDate {
        self.date_naive()
    }
}

/// Set of dates with the time-of-day component discarded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateSet {
    dates: BTreeSet<NaiveDate>,
}

impl DateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, day: impl CalendarDay) -> bool {
        self.dates.insert(day.calendar_date())
    }

    pub fn contains(&self, day: &impl CalendarDay) -> bool {
        self.dates.contains(&day.calendar_date())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }
}

impl<D: CalendarDay> FromIterator<D> for DateSet {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().map(|d| d.calendar_date()).collect(),
        }
    }
}

impl<D: CalendarDay> Extend<D> for DateSet {
    fn extend<I: IntoIterator<Item = D>>(&mut self, iter: I) {
        self.dates.extend(iter.into_iter().map(|d| d.calendar_date()));
    }
}

/// Classify one day; an aired broadcast outranks a scheduled one
pub fn classify(
    day: impl CalendarDay,
    broadcast_dates: &DateSet,
    scheduled_dates: &DateSet,
) -> DayClassification {
    let day = day.calendar_date();
    if broadcast_dates.contains(&day) {
        DayClassification::BroadcastDay
    } else if scheduled_dates.contains(&day) {
        DayClassification::ScheduledDay
    } else {
        DayClassification::PlainDay
    }
}

/// Every date of one calendar month, ascending
///
/// Restartable: each call to [`MonthGrid::iter`] yields the full month again.
/// Padding to a 7-column week layout is left to the consumer, see
/// [`MonthGrid::leading_padding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthGrid {
    first: NaiveDate,
    last: NaiveDate,
}

/// Build the grid for the month containing `anchor`
pub fn month_grid(anchor: impl CalendarDay) -> MonthGrid {
    let anchor = anchor.calendar_date();
    let first = anchor.with_day(1).unwrap_or(anchor);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    MonthGrid { first, last }
}

impl MonthGrid {
    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn len(&self) -> usize {
        (self.last - self.first).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> MonthDays {
        MonthDays {
            next: Some(self.first),
            last: self.last,
        }
    }

    /// Blank cells before the first date when weeks start on `week_start`
    pub fn leading_padding(&self, week_start: Weekday) -> u32 {
        (self.first.weekday().num_days_from_sunday() + 7 - week_start.num_days_from_sunday()) % 7
    }

    /// Pair every date with its classification
    pub fn classify(
        &self,
        broadcast_dates: &DateSet,
        scheduled_dates: &DateSet,
    ) -> Vec<(NaiveDate, DayClassification)> {
        self.iter()
            .map(|day| (day, classify(day, broadcast_dates, scheduled_dates)))
            .collect()
    }
}

impl IntoIterator for MonthGrid {
    type Item = NaiveDate;
    type IntoIter = MonthDays;

    fn into_iter(self) -> MonthDays {
        self.iter()
    }
}

impl IntoIterator for &MonthGrid {
    type Item = NaiveDate;
    type IntoIter = MonthDays;

    fn into_iter(self) -> MonthDays {
        self.iter()
    }
}

/// Iterator over the days of a [`MonthGrid`]
#[derive(Debug, Clone)]
pub struct MonthDays {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl Iterator for MonthDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let day = self.next?;
        self.next = if day < self.last { day.succ_opt() } else { None };
        Some(day)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map(|d| (self.last - d).num_days() as usize + 1)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MonthDays {}

/// Same day one month earlier (clamped to month end); unchanged at the calendar edge
pub fn previous_month(anchor: NaiveDate) -> NaiveDate {
    anchor.checked_sub_months(Months::new(1)).unwrap_or(anchor)
}

/// Same day one month later (clamped to month end); unchanged at the calendar edge
pub fn next_month(anchor: NaiveDate) -> NaiveDate {
    anchor.checked_add_months(Months::new(1)).unwrap_or(anchor)
}
