//! Page snapshots served to clients on first load.
//!
//! A client seeds its local mirrors from these and keeps them current with
//! the push events in [`crate::protocol`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::protocol::{ChatMessageView, LunchStatus, PollOptionTally};
use crate::week::IsoWeek;

/// A user as listed on the week board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardUser {
    /// User id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Avatar URL or storage path.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// One stored `(user, weekday)` cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStatusRow {
    /// Row id (locally generated on clients for rows created by events).
    pub id: i64,
    /// Owner.
    pub user_id: i64,
    /// 1 (Monday) to 5 (Friday).
    pub weekday: u8,
    /// Lunch plan.
    pub status: Option<LunchStatus>,
    /// `HH:MM`.
    pub arrival_time: Option<String>,
    /// Free-text place.
    pub location: Option<String>,
}

impl DayStatusRow {
    /// Whether any value is set.
    #[must_use]
    pub const fn has_values(&self) -> bool {
        self.status.is_some() || self.arrival_time.is_some() || self.location.is_some()
    }
}

/// A poll with its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollView {
    /// Poll id.
    pub id: i64,
    /// Day the poll is for.
    pub poll_date: NaiveDate,
    /// Local time-of-day when voting closes.
    pub deadline: NaiveTime,
    /// Inactive polls never accept votes.
    pub is_active: bool,
    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,
    /// Options, order depending on the view.
    pub options: Vec<PollOptionTally>,
}

/// The viewer's vote on a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVote {
    /// Vote id.
    pub id: i64,
    /// Poll voted on.
    pub poll_id: i64,
    /// Chosen option.
    pub poll_option_id: i64,
}

/// `GET /week-status` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBoard {
    /// Displayed week.
    pub week: IsoWeek,
    /// Weekday to focus (today if Monday-Friday, else Monday).
    pub active_weekday: u8,
    /// Viewer first, then by name.
    pub users: Vec<BoardUser>,
    /// Rows grouped by user id.
    pub statuses: BTreeMap<i64, Vec<DayStatusRow>>,
    /// The only user whose cells the viewer may edit.
    pub can_edit_user_id: i64,
    /// Visible chat, oldest first.
    pub chat_messages: Vec<ChatMessageView>,
    /// Today's poll, options by votes.
    pub poll: Option<PollView>,
    /// Viewer's vote on today's poll.
    pub user_vote: Option<UserVote>,
    /// Present iff `poll` is.
    pub is_voting_open: Option<bool>,
}

/// `GET /poll` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPage {
    /// Today's poll, options by votes.
    pub poll: PollView,
    /// Viewer's vote.
    pub user_vote: Option<UserVote>,
    /// Whether the poll is open right now.
    pub is_voting_open: bool,
    /// Human-readable time left, e.g. `in 2 hours`; `None` once closed.
    pub time_until_deadline: Option<String>,
}
