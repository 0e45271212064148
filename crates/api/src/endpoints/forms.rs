//! Request bodies and their validation rules.
//!
//! Strings are trimmed and blank strings treated as absent before
//! validation, the way form submissions arrive from browsers.

#![allow(missing_docs)]

use std::borrow::Cow;

use chrono::NaiveTime;
use lunchsync_common::{AppError, AppResult, ISO_WEEK_PATTERN, IsoWeek, LunchStatus};
use lunchsync_core::StatusInput;
use serde::Deserialize;
use validator::{Validate, ValidationError};

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_clock_time(value: &str) -> Result<(), ValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| {
            ValidationError::new("date_format").with_message(Cow::Borrowed(
                "The arrival time field must match the format H:i.",
            ))
        })
}

fn validate_status(value: &str) -> Result<(), ValidationError> {
    value.parse::<LunchStatus>().map(|_| ()).map_err(|_| {
        ValidationError::new("in").with_message(Cow::Borrowed("The selected status is invalid."))
    })
}

fn parse_week(value: &str) -> AppResult<IsoWeek> {
    value
        .parse()
        .map_err(|_| AppError::field("iso_week", "The iso week field format is invalid."))
}

/// `POST /week-status`.
#[derive(Debug, Deserialize, Validate)]
pub struct StatusForm {
    #[validate(regex(path = *ISO_WEEK_PATTERN, message = "The iso week field format is invalid."))]
    pub iso_week: String,

    #[validate(range(min = 1, max = 5, message = "The weekday field must be between 1 and 5."))]
    pub weekday: u8,

    #[serde(default)]
    #[validate(custom(function = "validate_status"))]
    pub status: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_clock_time"))]
    pub arrival_time: Option<String>,

    #[serde(default)]
    #[validate(length(
        max = 120,
        message = "The location field must not be greater than 120 characters."
    ))]
    pub location: Option<String>,
}

impl StatusForm {
    /// Normalize, validate and convert.
    pub fn into_input(self) -> AppResult<StatusInput> {
        let form = Self {
            status: blank_to_none(self.status),
            arrival_time: blank_to_none(self.arrival_time),
            location: blank_to_none(self.location),
            iso_week: self.iso_week.trim().to_string(),
            ..self
        };
        form.validate()?;

        let status = form
            .status
            .as_deref()
            .map(str::parse::<LunchStatus>)
            .transpose()
            .map_err(|_| AppError::field("status", "The selected status is invalid."))?;
        let arrival_time = form
            .arrival_time
            .as_deref()
            .map(|t| NaiveTime::parse_from_str(t, "%H:%M"))
            .transpose()
            .map_err(|_| {
                AppError::field("arrival_time", "The arrival time field must match the format H:i.")
            })?;

        Ok(StatusInput {
            iso_week: parse_week(&form.iso_week)?,
            weekday: form.weekday,
            status,
            arrival_time,
            location: form.location,
        })
    }
}

/// `DELETE /week-status`.
#[derive(Debug, Deserialize, Validate)]
pub struct ClearStatusForm {
    #[validate(regex(path = *ISO_WEEK_PATTERN, message = "The iso week field format is invalid."))]
    pub iso_week: String,

    #[validate(range(min = 1, max = 5, message = "The weekday field must be between 1 and 5."))]
    pub weekday: u8,
}

impl ClearStatusForm {
    /// Validate and return the cell key.
    pub fn into_key(self) -> AppResult<(IsoWeek, u8)> {
        self.validate()?;
        Ok((parse_week(&self.iso_week)?, self.weekday))
    }
}

/// `GET /week-status?week=`.
#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub week: Option<String>,
}

impl WeekQuery {
    /// Requested week, if any.
    pub fn week(&self) -> AppResult<Option<IsoWeek>> {
        match self.week.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            Some(w) => w
                .parse()
                .map(Some)
                .map_err(|_| AppError::field("week", "The week field format is invalid.")),
            None => Ok(None),
        }
    }
}

/// `POST /week-status/chat`.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatForm {
    #[validate(regex(path = *ISO_WEEK_PATTERN, message = "The iso week field format is invalid."))]
    pub iso_week: String,

    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 5000,
        message = "The body field must be between 1 and 5000 characters."
    ))]
    pub body: String,
}

impl ChatForm {
    /// Validate and return `(week, trimmed body)`.
    pub fn into_parts(self) -> AppResult<(IsoWeek, String)> {
        let form = Self {
            iso_week: self.iso_week.trim().to_string(),
            body: self.body.trim().to_string(),
        };
        if form.body.is_empty() {
            return Err(AppError::field("body", "The body field is required."));
        }
        form.validate()?;
        Ok((parse_week(&form.iso_week)?, form.body))
    }
}

/// `POST /poll/vote` and `POST /poll/unvote`.
#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub poll_option_id: i64,
}

/// `POST /poll/store-from-chat`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollForm {
    #[serde(default)]
    #[validate(length(max = 120, message = "The title field must not be greater than 120 characters."))]
    pub title: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "The options field must have at least 1 items."))]
    pub options: Vec<String>,
}

impl CreatePollForm {
    /// Validate; option trimming happens in the Poll Engine.
    pub fn into_parts(self) -> AppResult<(Option<String>, Vec<String>)> {
        let form = Self {
            title: blank_to_none(self.title),
            ..self
        };
        form.validate()?;
        Ok((form.title, form.options))
    }
}
