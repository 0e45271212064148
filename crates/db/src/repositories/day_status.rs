//! Day status repository.

use std::sync::Arc;

use crate::entities::{DayStatus, day_status};
use lunchsync_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};

/// Repository for per-user, per-weekday statuses.
#[derive(Clone)]
pub struct DayStatusRepository {
    db: Arc<DatabaseConnection>,
}

impl DayStatusRepository {
    /// Create a new day status repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert or overwrite the row for `(user_id, iso_week, weekday)`.
    ///
    /// Relies on the unique index over those columns; a single statement so
    /// two writers for the same key cannot produce duplicates.
    pub async fn upsert(&self, model: day_status::ActiveModel) -> AppResult<day_status::Model> {
        DayStatus::insert(model)
            .on_conflict(
                OnConflict::columns([
                    day_status::Column::UserId,
                    day_status::Column::IsoWeek,
                    day_status::Column::Weekday,
                ])
                .update_columns([
                    day_status::Column::Status,
                    day_status::Column::ArrivalTime,
                    day_status::Column::Location,
                    day_status::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete the row for `(user_id, iso_week, weekday)`. Returns the number
    /// of deleted rows.
    pub async fn delete(&self, user_id: i64, iso_week: &str, weekday: i16) -> AppResult<u64> {
        let result = DayStatus::delete_many()
            .filter(day_status::Column::UserId.eq(user_id))
            .filter(day_status::Column::IsoWeek.eq(iso_week))
            .filter(day_status::Column::Weekday.eq(weekday))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// All rows for a week.
    pub async fn find_by_week(&self, iso_week: &str) -> AppResult<Vec<day_status::Model>> {
        DayStatus::find()
            .filter(day_status::Column::IsoWeek.eq(iso_week))
            .order_by_asc(day_status::Column::UserId)
            .order_by_asc(day_status::Column::Weekday)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
