//! Calendar helpers for rendering a week.

use chrono::{Datelike, NaiveDate};
use lunchsync_common::IsoWeek;

/// Calendar date of `weekday` (1 = Monday) in `week`.
#[must_use]
pub fn date_of(week: &IsoWeek, weekday: u8) -> Option<NaiveDate> {
    week.date_of(weekday)
}

/// Whether `weekday` of `week` is `today`.
#[must_use]
pub fn is_today(week: &IsoWeek, weekday: u8, today: NaiveDate) -> bool {
    date_of(week, weekday) == Some(today)
}

/// Day label such as `15/1`.
#[must_use]
pub fn day_label(date: NaiveDate) -> String {
    format!("{}/{}", date.day(), date.month())
}

/// Week number part of a week key, e.g. `03` for `2025-W03`.
#[must_use]
pub fn week_number(week: &IsoWeek) -> &str {
    week.as_str()
        .split_once("-W")
        .map_or(week.as_str(), |(_, n)| n)
}
