//! Local mirrors of server state and the merge function for each push event.
//!
//! A client holds three independent mirrors, each seeded from the first-load
//! snapshot and then kept current by events:
//!
//! - [`StatusMirror`]: rows grouped by user, merged from status changes
//! - [`ChatMirror`]: messages oldest first, appended from chat events
//! - [`PollMirror`]: today's poll plus every poll embedded in chat, merged
//!   from poll tally events
//!
//! Every merge is idempotent: applying the same event twice leaves the same
//! state as applying it once.

use std::collections::BTreeMap;

use lunchsync_common::{
    ChatMessageView, DayStatusRow, PollOptionTally, PollTally, PollView, StatusChanged, UserVote,
};
use serde::{Deserialize, Serialize};

/// Status rows grouped by user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMirror {
    rows: BTreeMap<i64, Vec<DayStatusRow>>,
    next_local_id: i64,
}

impl StatusMirror {
    /// Seed from a snapshot.
    #[must_use]
    pub const fn new(rows: BTreeMap<i64, Vec<DayStatusRow>>) -> Self {
        Self {
            rows,
            next_local_id: -1,
        }
    }

    /// The row for `(user_id, weekday)`, if any.
    #[must_use]
    pub fn get(&self, user_id: i64, weekday: u8) -> Option<&DayStatusRow> {
        self.rows
            .get(&user_id)?
            .iter()
            .find(|row| row.weekday == weekday)
    }

    /// All rows of one user.
    #[must_use]
    pub fn rows_of(&self, user_id: i64) -> &[DayStatusRow] {
        self.rows.get(&user_id).map_or(&[], Vec::as_slice)
    }

    /// Every row, grouped by user.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<i64, Vec<DayStatusRow>> {
        &self.rows
    }

    /// Put a cell back exactly as it was; `None` empties it.
    pub fn restore(&mut self, user_id: i64, weekday: u8, row: Option<DayStatusRow>) {
        let rows = self.rows.entry(user_id).or_default();
        rows.retain(|r| r.weekday != weekday);
        rows.extend(row);
    }

    /// Merge a status change.
    ///
    /// A cleared event removes the row. Otherwise the row is replaced in
    /// place, keeping its id, or appended under a locally generated id.
    /// Local ids are negative so they never collide with stored ones.
    pub fn apply(&mut self, event: &StatusChanged) {
        let rows = self.rows.entry(event.user_id).or_default();
        let idx = rows.iter().position(|row| row.weekday == event.weekday);

        if event.is_cleared() {
            if let Some(idx) = idx {
                rows.remove(idx);
            }
            return;
        }

        let id = match idx {
            Some(idx) => rows[idx].id,
            None => {
                let id = self.next_local_id;
                self.next_local_id -= 1;
                id
            }
        };
        let next = DayStatusRow {
            id,
            user_id: event.user_id,
            weekday: event.weekday,
            status: event.status,
            arrival_time: event.arrival_time.clone(),
            location: event.location.clone(),
        };
        match idx {
            Some(idx) => rows[idx] = next,
            None => rows.push(next),
        }
    }
}

/// Chat messages, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMirror {
    messages: Vec<ChatMessageView>,
}

impl ChatMirror {
    /// Seed from a snapshot.
    #[must_use]
    pub const fn new(messages: Vec<ChatMessageView>) -> Self {
        Self { messages }
    }

    /// Messages in display order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessageView] {
        &self.messages
    }

    pub(crate) fn messages_mut(&mut self) -> &mut [ChatMessageView] {
        &mut self.messages
    }

    /// Append a posted message.
    ///
    /// The push event is the only path that adds messages, the sender's own
    /// included, so a repeated delivery of the same id is skipped rather than
    /// shown twice.
    pub fn apply(&mut self, message: ChatMessageView) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        self.messages.push(message);
    }
}

/// Poll tallies: today's poll and every poll embedded in chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollMirror {
    /// Today's poll, if one exists.
    pub today: Option<PollView>,
    /// Viewer's vote on today's poll.
    pub user_vote: Option<UserVote>,
    /// Whether today's poll accepts votes.
    pub is_voting_open: Option<bool>,
}

impl PollMirror {
    /// Seed from a snapshot.
    #[must_use]
    pub const fn new(
        today: Option<PollView>,
        user_vote: Option<UserVote>,
        is_voting_open: Option<bool>,
    ) -> Self {
        Self {
            today,
            user_vote,
            is_voting_open,
        }
    }

    /// Merge fresh tallies into today's poll when the ids match.
    ///
    /// Options keep the order the view already had; counts and labels come
    /// from the event.
    pub fn apply(&mut self, tally: &PollTally) {
        let Some(today) = self.today.as_mut().filter(|poll| poll.id == tally.id) else {
            return;
        };
        merge_options(&mut today.options, &tally.options);
    }
}

/// Overwrite `current` with the matching entries of `fresh`.
///
/// Options missing from `fresh` are left alone and options new in `fresh`
/// are appended.
pub(crate) fn merge_options(current: &mut Vec<PollOptionTally>, fresh: &[PollOptionTally]) {
    for option in fresh {
        match current.iter_mut().find(|o| o.id == option.id) {
            Some(slot) => slot.clone_from(option),
            None => current.push(option.clone()),
        }
    }
}

/// Merge fresh tallies into every chat message embedding that poll.
pub fn apply_to_chat(chat: &mut ChatMirror, tally: &PollTally) {
    for card in chat
        .messages
        .iter_mut()
        .filter_map(|m| m.payload.as_mut())
        .filter(|card| card.poll_id == tally.id)
    {
        card.options.clone_from(&tally.options);
    }
}
