//! Editing the viewer's own week row.
//!
//! [`WeekEditor`] turns UI gestures into [`StatusWrite`]s. Location typing
//! is debounced per cell; everything else produces a write immediately.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lunchsync_common::{DayStatusRow, IsoWeek, LunchStatus, SharedClock, StatusChanged};
use serde::Serialize;

use crate::debounce::DebounceTable;

/// Suggestions offered under the location field.
pub const DEFAULT_LOCATIONS: [&str; 2] = ["Bulten", "Lindholmen"];

/// Quiet period before a typed location is sent.
pub const LOCATION_DEBOUNCE: Duration = Duration::from_secs(2);

/// Gap between writes when copying a day to the rest of the week.
pub const COMING_DAYS_STAGGER: Duration = Duration::from_millis(250);

/// Weekdays shown on the board.
pub const WEEKDAYS: [u8; 5] = [1, 2, 3, 4, 5];

/// A `(user, weekday)` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Owner.
    pub user_id: i64,
    /// 1 (Monday) to 5 (Friday).
    pub weekday: u8,
}

/// Body of `POST /week-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusWrite {
    /// Target week.
    pub iso_week: IsoWeek,
    /// Target weekday.
    pub weekday: u8,
    /// Lunch plan.
    pub status: Option<LunchStatus>,
    /// `HH:MM`.
    pub arrival_time: Option<String>,
    /// Free-text place.
    pub location: Option<String>,
}

impl StatusWrite {
    /// The event the server will broadcast once `user_id` saves this.
    #[must_use]
    pub fn as_event(&self, user_id: i64) -> StatusChanged {
        StatusChanged {
            iso_week: self.iso_week.clone(),
            user_id,
            weekday: self.weekday,
            status: self.status,
            arrival_time: self.arrival_time.clone(),
            location: self.location.clone(),
        }
    }
}

/// Body of `DELETE /week-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearRequest {
    /// Target week.
    pub iso_week: IsoWeek,
    /// Target weekday.
    pub weekday: u8,
}

/// Values copied from one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopiedDay {
    /// Lunch plan.
    pub status: Option<LunchStatus>,
    /// `HH:MM`.
    pub arrival_time: Option<String>,
    /// Free-text place.
    pub location: Option<String>,
}

impl CopiedDay {
    fn from_row(row: Option<&DayStatusRow>) -> Self {
        row.map_or_else(Self::default, |row| Self {
            status: row.status,
            arrival_time: row.arrival_time.clone(),
            location: row.location.clone(),
        })
    }
}

/// A write to send after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaggeredWrite {
    /// Offset from the start of the batch.
    pub delay: Duration,
    /// The write.
    pub write: StatusWrite,
}

/// Writes that copy one day onto every later weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComingDaysPlan {
    /// Writes in weekday order.
    pub writes: Vec<StaggeredWrite>,
    /// Later weekdays that already hold values and will be overwritten.
    pub overwritten: Vec<u8>,
}

impl ComingDaysPlan {
    /// Whether the plan has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Editor state for the viewer's own cells in one week.
pub struct WeekEditor {
    user_id: i64,
    week: IsoWeek,
    drafts: HashMap<CellKey, String>,
    pending: DebounceTable<CellKey, StatusWrite>,
    skip_blur: HashSet<CellKey>,
    suggestions: Vec<String>,
    clipboard: Option<CopiedDay>,
}

impl WeekEditor {
    /// Editor for `user_id`'s cells in `week`.
    #[must_use]
    pub fn new(user_id: i64, week: IsoWeek, clock: SharedClock) -> Self {
        Self {
            user_id,
            week,
            drafts: HashMap::new(),
            pending: DebounceTable::new(clock, LOCATION_DEBOUNCE),
            skip_blur: HashSet::new(),
            suggestions: DEFAULT_LOCATIONS.iter().map(ToString::to_string).collect(),
            clipboard: None,
        }
    }

    /// Replace the suggestion list.
    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// The week being edited.
    #[must_use]
    pub const fn week(&self) -> &IsoWeek {
        &self.week
    }

    const fn key(&self, weekday: u8) -> CellKey {
        CellKey {
            user_id: self.user_id,
            weekday,
        }
    }

    /// What the location field shows: the draft, else the stored value.
    #[must_use]
    pub fn location_value(&self, weekday: u8, row: Option<&DayStatusRow>) -> String {
        self.drafts
            .get(&self.key(weekday))
            .cloned()
            .or_else(|| row.and_then(|r| r.location.clone()))
            .unwrap_or_default()
    }

    fn write(
        &self,
        weekday: u8,
        status: Option<LunchStatus>,
        arrival_time: Option<String>,
        location: Option<String>,
    ) -> StatusWrite {
        if status == Some(LunchStatus::Home) {
            return StatusWrite {
                iso_week: self.week.clone(),
                weekday,
                status,
                arrival_time: None,
                location: None,
            };
        }
        StatusWrite {
            iso_week: self.week.clone(),
            weekday,
            status,
            arrival_time,
            location,
        }
    }

    /// Pick a status. `Home` drops the arrival time and location.
    pub fn choose_status(
        &mut self,
        weekday: u8,
        status: Option<LunchStatus>,
        row: Option<&DayStatusRow>,
    ) -> StatusWrite {
        let key = self.key(weekday);
        self.pending.cancel(&key);
        let location = non_blank(&self.location_value(weekday, row));
        let arrival_time = row.and_then(|r| r.arrival_time.clone());
        self.write(weekday, status, arrival_time, location)
    }

    /// Change the arrival time.
    pub fn set_arrival_time(
        &mut self,
        weekday: u8,
        arrival_time: Option<&str>,
        row: Option<&DayStatusRow>,
    ) -> StatusWrite {
        let key = self.key(weekday);
        self.pending.cancel(&key);
        let location = non_blank(&self.location_value(weekday, row));
        self.write(
            weekday,
            row.and_then(|r| r.status),
            arrival_time.and_then(non_blank),
            location,
        )
    }

    /// Record a keystroke in the location field and re-arm its timer.
    pub fn edit_location(&mut self, weekday: u8, draft: &str, row: Option<&DayStatusRow>) {
        let key = self.key(weekday);
        self.drafts.insert(key, draft.to_string());
        let write = self.write(
            weekday,
            row.and_then(|r| r.status),
            row.and_then(|r| r.arrival_time.clone()),
            non_blank(draft),
        );
        if self.pending.schedule(key, write) {
            tracing::trace!(weekday, "Location write re-armed");
        }
    }

    /// Suggestions containing the current draft, case-insensitively.
    #[must_use]
    pub fn suggestions(&self, weekday: u8, row: Option<&DayStatusRow>) -> Vec<&str> {
        let needle = self.location_value(weekday, row).to_lowercase();
        self.suggestions
            .iter()
            .filter(|s| s.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Pointer went down on a suggestion; the blur that follows must not send.
    pub fn press_suggestion(&mut self, weekday: u8) {
        let key = self.key(weekday);
        self.skip_blur.insert(key);
    }

    /// A suggestion was picked: send it now.
    pub fn select_suggestion(
        &mut self,
        weekday: u8,
        location: &str,
        row: Option<&DayStatusRow>,
    ) -> StatusWrite {
        let key = self.key(weekday);
        self.pending.cancel(&key);
        self.skip_blur.remove(&key);
        self.drafts.insert(key, location.to_string());
        self.write(
            weekday,
            row.and_then(|r| r.status),
            row.and_then(|r| r.arrival_time.clone()),
            non_blank(location),
        )
    }

    /// The location field lost focus.
    ///
    /// Sends the pending write right away, unless a suggestion press is in
    /// flight for this cell.
    pub fn blur(&mut self, weekday: u8) -> Option<StatusWrite> {
        let key = self.key(weekday);
        if self.skip_blur.remove(&key) {
            return None;
        }
        self.pending.flush(&key)
    }

    /// Clear a cell: drops its timer and draft.
    pub fn clear(&mut self, weekday: u8) -> ClearRequest {
        let key = self.key(weekday);
        self.pending.cancel(&key);
        self.drafts.remove(&key);
        self.skip_blur.remove(&key);
        ClearRequest {
            iso_week: self.week.clone(),
            weekday,
        }
    }

    /// Writes whose debounce elapsed.
    pub fn due_writes(&mut self) -> Vec<StatusWrite> {
        self.pending
            .take_due()
            .into_iter()
            .map(|(_, write)| write)
            .collect()
    }

    /// When the next debounced write fires.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.next_due()
    }

    /// Whether a location write is waiting for `weekday`.
    #[must_use]
    pub fn has_pending(&self, weekday: u8) -> bool {
        self.pending.is_pending(&self.key(weekday))
    }

    /// Copy a day's values.
    pub fn copy_day(&mut self, row: Option<&DayStatusRow>) -> &CopiedDay {
        self.clipboard.insert(CopiedDay::from_row(row))
    }

    /// The copied values, if any.
    #[must_use]
    pub const fn clipboard(&self) -> Option<&CopiedDay> {
        self.clipboard.as_ref()
    }

    /// Paste the copied values onto `weekday`.
    #[must_use]
    pub fn paste_day(&self, weekday: u8) -> Option<StatusWrite> {
        let copied = self.clipboard.as_ref()?;
        Some(StatusWrite {
            iso_week: self.week.clone(),
            weekday,
            status: copied.status,
            arrival_time: copied.arrival_time.clone(),
            location: copied.location.clone(),
        })
    }

    /// Copy `weekday`'s values onto every later weekday, one write per
    /// [`COMING_DAYS_STAGGER`].
    #[must_use]
    pub fn plan_coming_days(&self, weekday: u8, rows: &[DayStatusRow]) -> ComingDaysPlan {
        let find = |day: u8| rows.iter().find(|r| r.weekday == day);
        let source = CopiedDay::from_row(find(weekday));

        let later: Vec<u8> = WEEKDAYS.into_iter().filter(|d| *d > weekday).collect();
        let overwritten = later
            .iter()
            .copied()
            .filter(|d| find(*d).is_some_and(DayStatusRow::has_values))
            .collect();
        let writes = later
            .into_iter()
            .zip(0u32..)
            .map(|(day, index)| StaggeredWrite {
                delay: COMING_DAYS_STAGGER * index,
                write: StatusWrite {
                    iso_week: self.week.clone(),
                    weekday: day,
                    status: source.status,
                    arrival_time: source.arrival_time.clone(),
                    location: source.location.clone(),
                },
            })
            .collect();

        ComingDaysPlan {
            writes,
            overwritten,
        }
    }
}
