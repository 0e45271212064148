//! Chat message repository.

use std::sync::Arc;

use crate::entities::{ChatMessage, User, chat_message, user};
use chrono::{DateTime, FixedOffset};
use lunchsync_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// A message joined with its author.
pub type MessageWithAuthor = (chat_message::Model, Option<user::Model>);

/// Chat message repository for database operations.
#[derive(Clone)]
pub struct ChatMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl ChatMessageRepository {
    /// Create a new chat message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new message.
    pub async fn create(&self, model: chat_message::ActiveModel) -> AppResult<chat_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The newest `limit` messages of a week created at or after `since`,
    /// returned oldest first.
    pub async fn find_recent_since(
        &self,
        iso_week: &str,
        since: DateTime<FixedOffset>,
        limit: u64,
    ) -> AppResult<Vec<MessageWithAuthor>> {
        let mut rows = ChatMessage::find()
            .filter(chat_message::Column::IsoWeek.eq(iso_week))
            .filter(chat_message::Column::CreatedAt.gte(since))
            .order_by_desc(chat_message::Column::Id)
            .limit(limit)
            .find_also_related(User)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.reverse();
        Ok(rows)
    }
}
