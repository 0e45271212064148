//! Status Store: per-user, per-weekday lunch plans.

use std::collections::BTreeMap;

use crate::services::event_publisher::{EventPublisherService, publish_best_effort};
use chrono::NaiveTime;
use lunchsync_common::{
    AppError, AppResult, DayStatusRow, IsoWeek, LocalClock, LunchEvent, LunchStatus,
    StatusChanged,
};
use lunchsync_db::{entities::day_status, repositories::DayStatusRepository};
use sea_orm::{NotSet, Set};

/// Longest accepted location.
pub const MAX_LOCATION_CHARS: usize = 120;

/// A validated status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInput {
    /// Week of the cell.
    pub iso_week: IsoWeek,
    /// 1 (Monday) to 5 (Friday).
    pub weekday: u8,
    /// Lunch plan.
    pub status: Option<LunchStatus>,
    /// Arrival time.
    pub arrival_time: Option<NaiveTime>,
    /// Free-text place.
    pub location: Option<String>,
}

/// Render a stored time as `HH:MM`.
#[must_use]
pub fn format_arrival(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Event describing the stored state of a row.
#[must_use]
pub fn status_event(row: &day_status::Model, iso_week: IsoWeek) -> StatusChanged {
    StatusChanged {
        iso_week,
        user_id: row.user_id,
        weekday: u8::try_from(row.weekday).unwrap_or_default(),
        status: row.status.map(Into::into),
        arrival_time: row.arrival_time.map(format_arrival),
        location: row.location.clone(),
    }
}

/// Snapshot row for a stored cell.
#[must_use]
pub fn status_row(row: &day_status::Model) -> DayStatusRow {
    DayStatusRow {
        id: row.id,
        user_id: row.user_id,
        weekday: u8::try_from(row.weekday).unwrap_or_default(),
        status: row.status.map(Into::into),
        arrival_time: row.arrival_time.map(format_arrival),
        location: row.location.clone(),
    }
}

fn check_weekday(weekday: u8) -> AppResult<()> {
    if (1..=5).contains(&weekday) {
        Ok(())
    } else {
        Err(AppError::field(
            "weekday",
            "The weekday field must be between 1 and 5.",
        ))
    }
}

/// Week status service for business logic.
#[derive(Clone)]
pub struct WeekStatusService {
    status_repo: DayStatusRepository,
    clock: LocalClock,
    event_publisher: Option<EventPublisherService>,
}

impl WeekStatusService {
    /// Create a new week status service.
    #[must_use]
    pub const fn new(status_repo: DayStatusRepository, clock: LocalClock) -> Self {
        Self {
            status_repo,
            clock,
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create or overwrite the caller's cell and announce its new state.
    ///
    /// The event is emitted even when every value is empty.
    pub async fn upsert(&self, user_id: i64, input: StatusInput) -> AppResult<day_status::Model> {
        check_weekday(input.weekday)?;
        if let Some(location) = &input.location
            && location.chars().count() > MAX_LOCATION_CHARS
        {
            return Err(AppError::field(
                "location",
                "The location field must not be greater than 120 characters.",
            ));
        }

        let now = self.clock.now().fixed_offset();
        let model = day_status::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            iso_week: Set(input.iso_week.as_str().to_string()),
            weekday: Set(i16::from(input.weekday)),
            status: Set(input.status.map(Into::into)),
            arrival_time: Set(input.arrival_time),
            location: Set(input.location),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = self.status_repo.upsert(model).await?;

        tracing::info!(
            user_id,
            iso_week = %input.iso_week,
            weekday = input.weekday,
            "Day status saved"
        );

        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::StatusChanged(status_event(&saved, input.iso_week)),
        )
        .await;

        Ok(saved)
    }

    /// Delete the caller's cell. Returns whether a row was removed; only then
    /// is a cleared event emitted.
    pub async fn destroy(&self, user_id: i64, iso_week: &IsoWeek, weekday: u8) -> AppResult<bool> {
        check_weekday(weekday)?;

        let deleted = self
            .status_repo
            .delete(user_id, iso_week.as_str(), i16::from(weekday))
            .await?;

        if deleted == 0 {
            tracing::debug!(user_id, iso_week = %iso_week, weekday, "Nothing to clear");
            return Ok(false);
        }

        tracing::info!(user_id, iso_week = %iso_week, weekday, "Day status cleared");

        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::StatusChanged(StatusChanged::cleared(iso_week.clone(), user_id, weekday)),
        )
        .await;

        Ok(true)
    }

    /// All rows of a week grouped by user.
    pub async fn statuses_by_user(
        &self,
        iso_week: &IsoWeek,
    ) -> AppResult<BTreeMap<i64, Vec<DayStatusRow>>> {
        let rows = self.status_repo.find_by_week(iso_week.as_str()).await?;

        let mut grouped: BTreeMap<i64, Vec<DayStatusRow>> = BTreeMap::new();
        for row in &rows {
            grouped.entry(row.user_id).or_default().push(status_row(row));
        }
        Ok(grouped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::RecordingEventPublisher;
    use chrono::{TimeZone, Utc};
    use lunchsync_common::ManualClock;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn test_clock() -> LocalClock {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        LocalClock::new(Arc::new(ManualClock::new(now)), chrono_tz::Europe::Stockholm)
    }

    fn week() -> IsoWeek {
        "2025-W03".parse().unwrap()
    }

    fn create_test_row(status: Option<day_status::LunchStatus>) -> day_status::Model {
        day_status::Model {
            id: 11,
            user_id: 1,
            iso_week: "2025-W03".to_string(),
            weekday: 3,
            status,
            arrival_time: NaiveTime::from_hms_opt(11, 45, 0),
            location: Some("Lindholmen".to_string()),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service_with(db: sea_orm::DatabaseConnection) -> (WeekStatusService, RecordingEventPublisher) {
        let recorder = RecordingEventPublisher::new();
        let mut service =
            WeekStatusService::new(DayStatusRepository::new(Arc::new(db)), test_clock());
        service.set_event_publisher(Arc::new(recorder.clone()));
        (service, recorder)
    }

    fn input(weekday: u8) -> StatusInput {
        StatusInput {
            iso_week: week(),
            weekday,
            status: Some(LunchStatus::Buying),
            arrival_time: NaiveTime::from_hms_opt(11, 45, 0),
            location: Some("Lindholmen".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_emits_full_state() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_row(Some(day_status::LunchStatus::Buying))]])
            .into_connection();
        let (service, recorder) = service_with(db);

        let saved = service.upsert(1, input(3)).await.unwrap();
        assert_eq!(saved.id, 11);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let LunchEvent::StatusChanged(event) = &events[0] else {
            panic!("expected a status event");
        };
        assert_eq!(event.weekday, 3);
        assert_eq!(event.status, Some(LunchStatus::Buying));
        assert_eq!(event.arrival_time.as_deref(), Some("11:45"));
        assert_eq!(events[0].channel(), "week-status.2025-W03");
    }

    #[tokio::test]
    async fn test_upsert_rejects_weekend() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, recorder) = service_with(db);

        let result = service.upsert(1, input(6)).await;

        assert!(matches!(result, Err(AppError::InvalidFields(ref f)) if f.contains_key("weekday")));
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_long_location() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, _) = service_with(db);

        let mut long = input(2);
        long.location = Some("x".repeat(121));

        let result = service.upsert(1, long).await;
        assert!(matches!(result, Err(AppError::InvalidFields(ref f)) if f.contains_key("location")));
    }

    #[tokio::test]
    async fn test_destroy_emits_only_when_deleted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let (service, recorder) = service_with(db);

        assert!(!service.destroy(1, &week(), 3).await.unwrap());
        assert!(recorder.events().is_empty());

        assert!(service.destroy(1, &week(), 3).await.unwrap());
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], LunchEvent::StatusChanged(e) if e.is_cleared()));
    }

    #[tokio::test]
    async fn test_statuses_grouped_by_user() {
        let mut other = create_test_row(None);
        other.id = 12;
        other.user_id = 2;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_row(Some(day_status::LunchStatus::Home)), other]])
            .into_connection();
        let (service, _) = service_with(db);

        let grouped = service.statuses_by_user(&week()).await.unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&1][0].status, Some(LunchStatus::Home));
        assert_eq!(grouped[&2][0].location.as_deref(), Some("Lindholmen"));
    }
}
