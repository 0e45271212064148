//! Poll repository.
//!
//! Owns the vote transaction: the `(user_id, poll_id)` vote row and the
//! option counters it touches are always changed together.

use std::sync::Arc;

use crate::entities::{Poll, PollOption, Vote, chat_message, poll, poll_option, vote};
use chrono::{DateTime, FixedOffset, NaiveDate};
use lunchsync_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

/// How options are ordered when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionOrder {
    /// Creation order (stable ballot layout).
    Insertion,
    /// Highest `vote_count` first, ties by creation order (leaderboard).
    Votes,
}

/// What a vote request does to the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    /// The user already voted for this option.
    Unchanged,
    /// First vote by this user on the poll.
    Cast,
    /// The user moves their vote away from `from`.
    Switch {
        /// Option that loses the vote.
        from: i64,
    },
}

/// Result of a committed vote transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Applied change.
    pub change: VoteChange,
    /// Option ids whose counters moved, in the order they were touched.
    pub touched: Vec<i64>,
}

/// Decide how a vote for `option_id` applies given the user's existing vote.
#[must_use]
pub fn plan_vote(existing: Option<&vote::Model>, option_id: i64) -> VoteChange {
    match existing {
        Some(v) if v.poll_option_id == option_id => VoteChange::Unchanged,
        Some(v) => VoteChange::Switch {
            from: v.poll_option_id,
        },
        None => VoteChange::Cast,
    }
}

async fn insert_poll<C: ConnectionTrait>(
    conn: &C,
    model: poll::ActiveModel,
    options: Vec<(String, Option<String>)>,
) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
    let created = model
        .insert(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut rows = Vec::with_capacity(options.len());
    for (name, description) in options {
        let option = poll_option::ActiveModel {
            poll_id: Set(created.id),
            name: Set(name),
            description: Set(description),
            vote_count: Set(0),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        rows.push(option);
    }
    Ok((created, rows))
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {id}")))
    }

    /// The earliest poll created for `date`, if any.
    pub async fn find_first_for_date(&self, date: NaiveDate) -> AppResult<Option<poll::Model>> {
        Poll::find()
            .filter(poll::Column::PollDate.eq(date))
            .order_by_asc(poll::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a poll and its options in one transaction. Options are created
    /// in the given order with a zero count.
    pub async fn create_with_options(
        &self,
        model: poll::ActiveModel,
        options: Vec<(String, Option<String>)>,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = insert_poll(&txn, model, options).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Insert a poll, its options and the chat message announcing it in one
    /// transaction.
    ///
    /// `announce` builds the message from the inserted rows. Nothing is kept
    /// if any insert fails.
    pub async fn create_announced<F>(
        &self,
        model: poll::ActiveModel,
        options: Vec<(String, Option<String>)>,
        announce: F,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>, chat_message::Model)>
    where
        F: FnOnce(&poll::Model, &[poll_option::Model]) -> AppResult<chat_message::ActiveModel>
            + Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let (created, rows) = insert_poll(&txn, model, options).await?;
        let message = announce(&created, &rows)?
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((created, rows, message))
    }

    /// Resolve an option together with its parent poll.
    pub async fn get_option_with_poll(
        &self,
        option_id: i64,
    ) -> AppResult<(poll_option::Model, poll::Model)> {
        let found = PollOption::find_by_id(option_id)
            .find_also_related(Poll)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match found {
            Some((option, Some(poll))) => Ok((option, poll)),
            _ => Err(AppError::NotFound(format!(
                "Poll option not found: {option_id}"
            ))),
        }
    }

    /// Options of one poll.
    pub async fn find_options(
        &self,
        poll_id: i64,
        order: OptionOrder,
    ) -> AppResult<Vec<poll_option::Model>> {
        let query = PollOption::find().filter(poll_option::Column::PollId.eq(poll_id));
        let query = match order {
            OptionOrder::Insertion => query.order_by_asc(poll_option::Column::Id),
            OptionOrder::Votes => query
                .order_by_desc(poll_option::Column::VoteCount)
                .order_by_asc(poll_option::Column::Id),
        };

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Options of several polls in creation order.
    pub async fn find_options_for_polls(
        &self,
        poll_ids: &[i64],
    ) -> AppResult<Vec<poll_option::Model>> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.iter().copied()))
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The user's vote on a poll, if any.
    pub async fn find_user_vote(&self, poll_id: i64, user_id: i64) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(vote::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The user's votes across several polls.
    pub async fn find_user_votes(
        &self,
        poll_ids: &[i64],
        user_id: i64,
    ) -> AppResult<Vec<vote::Model>> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        Vote::find()
            .filter(vote::Column::PollId.is_in(poll_ids.iter().copied()))
            .filter(vote::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record `user_id`'s vote for `option_id` on `poll_id`.
    ///
    /// The poll's option rows are locked for the duration of the
    /// transaction, so the existing-vote check and the counter updates see a
    /// consistent view.
    pub async fn cast_vote(
        &self,
        poll_id: i64,
        option_id: i64,
        user_id: i64,
        now: DateTime<FixedOffset>,
    ) -> AppResult<VoteOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let options = PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !options.iter().any(|o| o.id == option_id) {
            return Err(AppError::NotFound(format!(
                "Poll option {option_id} does not belong to poll {poll_id}"
            )));
        }

        let existing = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let change = plan_vote(existing.as_ref(), option_id);
        let mut touched = Vec::new();

        if change != VoteChange::Unchanged {
            if let Some(old) = existing {
                Vote::delete_by_id(old.id)
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                adjust_vote_count(&txn, old.poll_option_id, -1).await?;
                touched.push(old.poll_option_id);
            }

            vote::ActiveModel {
                user_id: Set(user_id),
                poll_id: Set(poll_id),
                poll_option_id: Set(option_id),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            adjust_vote_count(&txn, option_id, 1).await?;
            touched.push(option_id);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(VoteOutcome { change, touched })
    }

    /// Remove `user_id`'s vote on `poll_id`. Returns the option whose counter
    /// was decremented, or `None` when the user had not voted.
    pub async fn remove_vote(&self, poll_id: i64, user_id: i64) -> AppResult<Option<i64>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let existing = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let removed = match existing {
            Some(old) => {
                Vote::delete_by_id(old.id)
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                adjust_vote_count(&txn, old.poll_option_id, -1).await?;
                Some(old.poll_option_id)
            }
            None => None,
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(removed)
    }
}

/// Add `delta` to an option's counter. Decrements never go below zero.
async fn adjust_vote_count<C: ConnectionTrait>(
    conn: &C,
    option_id: i64,
    delta: i32,
) -> AppResult<()> {
    let mut update = PollOption::update_many()
        .col_expr(
            poll_option::Column::VoteCount,
            Expr::col(poll_option::Column::VoteCount).add(delta),
        )
        .filter(poll_option::Column::Id.eq(option_id));

    if delta < 0 {
        update = update.filter(poll_option::Column::VoteCount.gt(0));
    }

    update
        .exec(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
