//! ISO-8601 week keys and weekday helpers.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Accepted shape of a week key (`2025-W02`).
pub static ISO_WEEK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\d{4}-W\d{2}$").expect("static regex")
});

/// Prefix of every broadcast channel name.
pub const CHANNEL_PREFIX: &str = "week-status.";

/// An ISO week key formatted `YYYY-Www`, Monday-start.
///
/// Parsing only checks the textual shape, matching what the request
/// validation accepts; calendar lookups return `None` for weeks that do not
/// exist (e.g. `2025-W00`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsoWeek(String);

/// Error for a string that is not shaped like `YYYY-Www`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ISO week {0:?}, expected YYYY-Www")]
pub struct InvalidIsoWeek(pub String);

impl IsoWeek {
    /// Week containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let week = date.iso_week();
        Self(format!("{:04}-W{:02}", week.year(), week.week()))
    }

    /// The week key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Broadcast channel name for this week.
    #[must_use]
    pub fn channel(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.0)
    }

    /// Calendar date of `weekday` (1 = Monday) within this week.
    #[must_use]
    pub fn date_of(&self, weekday: u8) -> Option<NaiveDate> {
        let (year, week) = self.parts()?;
        let weekday = weekday_from_number(weekday)?;
        NaiveDate::from_isoywd_opt(year, week, weekday)
    }

    /// The week immediately after this one.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        let monday = self.date_of(1)?;
        Some(Self::from_date(monday + chrono::Duration::days(7)))
    }

    fn parts(&self) -> Option<(i32, u32)> {
        let (year, week) = self.0.split_once("-W")?;
        Some((year.parse().ok()?, week.parse().ok()?))
    }
}

impl FromStr for IsoWeek {
    type Err = InvalidIsoWeek;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if ISO_WEEK_PATTERN.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidIsoWeek(s.to_string()))
        }
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for IsoWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IsoWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Extract the week key from a `week-status.{isoWeek}` channel name.
#[must_use]
pub fn week_from_channel(channel: &str) -> Option<IsoWeek> {
    channel.strip_prefix(CHANNEL_PREFIX)?.parse().ok()
}

/// ISO weekday number (1 = Monday .. 7 = Sunday).
#[must_use]
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Whether `date` falls on Monday-Friday.
#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    (1..=5).contains(&iso_weekday(date))
}

fn weekday_from_number(n: u8) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}
