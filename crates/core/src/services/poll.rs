//! Poll Engine: daily lunch polls and their vote counters.
//!
//! Open/closed is derived from `poll_date` + `deadline` on every read.

use crate::services::chat::message_view;
use crate::services::event_publisher::{EventPublisherService, publish_best_effort};
use chrono::{NaiveDateTime, NaiveTime};
use lunchsync_common::{
    AppError, AppResult, ChatMessageView, IsoWeek, LocalClock, LunchEvent, PollCard, PollPage,
    PollOptionTally, PollTally, PollView, UserVote, config::LunchConfig,
};
use lunchsync_db::{
    entities::{chat_message, poll, poll_option, user},
    repositories::{OptionOrder, PollRepository, VoteChange},
};
use sea_orm::Set;

/// Options seeded into an automatically created poll.
pub const DEFAULT_OPTIONS: [(&str, &str); 5] = [
    ("Pizza Palace", "Great pizza and Italian food"),
    ("Burger Barn", "Juicy burgers and fries"),
    ("Sushi Spot", "Fresh sushi and Japanese cuisine"),
    ("Taco Truck", "Authentic Mexican street food"),
    ("Salad Bar", "Healthy salads and wraps"),
];

/// Longest accepted poll title.
pub const MAX_TITLE_CHARS: usize = 120;

/// Longest accepted option name.
pub const MAX_OPTION_CHARS: usize = 120;

/// Poll tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Deadline given to new polls.
    pub deadline: NaiveTime,
    /// Whether closed polls reject votes.
    pub enforce_deadline: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            deadline: NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN),
            enforce_deadline: false,
        }
    }
}

impl PollSettings {
    /// Read from the `lunch` config section.
    pub fn from_config(config: &LunchConfig) -> AppResult<Self> {
        Ok(Self {
            deadline: config.poll_deadline_time()?,
            enforce_deadline: config.enforces_poll_deadline(),
        })
    }
}

/// Whether a poll accepts votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Before the deadline.
    Open,
    /// At or past the deadline, or deactivated.
    Closed,
}

/// Status of `poll` at local time `now`.
#[must_use]
pub fn poll_status(poll: &poll::Model, now: NaiveDateTime) -> PollStatus {
    if poll.is_active && now < poll.poll_date.and_time(poll.deadline) {
        PollStatus::Open
    } else {
        PollStatus::Closed
    }
}

/// `in 3 hours`, `in 1 minute`, ... (whole units, rounded down).
#[must_use]
pub fn humanize_until(now: NaiveDateTime, target: NaiveDateTime) -> String {
    let secs = (target - now).num_seconds().max(1);
    let (n, unit) = match secs {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s => (s / 86_400, "day"),
    };
    let plural = if n == 1 { "" } else { "s" };
    format!("in {n} {unit}{plural}")
}

/// `11:00 AM` style label.
#[must_use]
pub fn deadline_label(deadline: NaiveTime) -> String {
    deadline.format("%-I:%M %p").to_string()
}

/// Trim option names and drop blank ones, keeping input order.
#[must_use]
pub fn clean_options(options: &[String]) -> Vec<String> {
    options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn tally_of(option: &poll_option::Model) -> PollOptionTally {
    PollOptionTally {
        id: option.id,
        name: option.name.clone(),
        description: option.description.clone(),
        vote_count: option.vote_count,
    }
}

/// View of a poll with `options` in the given order.
#[must_use]
pub fn poll_view(poll: &poll::Model, options: &[poll_option::Model]) -> PollView {
    PollView {
        id: poll.id,
        poll_date: poll.poll_date,
        deadline: poll.deadline,
        is_active: poll.is_active,
        title: poll.title.clone(),
        options: options.iter().map(tally_of).collect(),
    }
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    clock: LocalClock,
    settings: PollSettings,
    event_publisher: Option<EventPublisherService>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        clock: LocalClock,
        settings: PollSettings,
    ) -> Self {
        Self {
            poll_repo,
            clock,
            settings,
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Status of `poll` right now.
    #[must_use]
    pub fn status(&self, poll: &poll::Model) -> PollStatus {
        poll_status(poll, self.clock.now().naive_local())
    }

    /// Today's first poll, if one exists.
    pub async fn today_poll(&self) -> AppResult<Option<poll::Model>> {
        self.poll_repo.find_first_for_date(self.clock.today()).await
    }

    /// Today's first poll, created with the default options if missing.
    pub async fn get_or_create_today(&self) -> AppResult<poll::Model> {
        if let Some(existing) = self.today_poll().await? {
            return Ok(existing);
        }

        let today = self.clock.today();
        let defaults = DEFAULT_OPTIONS
            .iter()
            .map(|(name, description)| ((*name).to_string(), Some((*description).to_string())))
            .collect();

        let (created, _) = self
            .poll_repo
            .create_with_options(self.new_poll(None), defaults)
            .await?;

        tracing::info!(poll_id = created.id, poll_date = %today, "Created today's poll");
        Ok(created)
    }

    /// Poll with options ordered by votes (leaderboard).
    pub async fn leaderboard(&self, poll: &poll::Model) -> AppResult<PollView> {
        let options = self.poll_repo.find_options(poll.id, OptionOrder::Votes).await?;
        Ok(poll_view(poll, &options))
    }

    /// Current tallies in creation order.
    pub async fn tally(&self, poll_id: i64) -> AppResult<PollTally> {
        let options = self
            .poll_repo
            .find_options(poll_id, OptionOrder::Insertion)
            .await?;
        Ok(PollTally {
            id: poll_id,
            options: options.iter().map(tally_of).collect(),
        })
    }

    /// The user's vote on a poll.
    pub async fn user_vote(&self, poll_id: i64, user_id: i64) -> AppResult<Option<UserVote>> {
        Ok(self
            .poll_repo
            .find_user_vote(poll_id, user_id)
            .await?
            .map(|v| UserVote {
                id: v.id,
                poll_id: v.poll_id,
                poll_option_id: v.poll_option_id,
            }))
    }

    /// Dedicated poll page: creates today's poll on first visit.
    pub async fn page(&self, user_id: i64) -> AppResult<PollPage> {
        let poll = self.get_or_create_today().await?;
        let view = self.leaderboard(&poll).await?;
        let user_vote = self.user_vote(poll.id, user_id).await?;

        let now = self.clock.now().naive_local();
        let is_voting_open = poll_status(&poll, now) == PollStatus::Open;
        let time_until_deadline =
            is_voting_open.then(|| humanize_until(now, poll.poll_date.and_time(poll.deadline)));

        Ok(PollPage {
            poll: view,
            user_vote,
            is_voting_open,
            time_until_deadline,
        })
    }

    /// Vote for `option_id`. Re-voting the current choice changes nothing;
    /// another option moves the vote. Tallies are published once committed.
    pub async fn vote(&self, user_id: i64, option_id: i64) -> AppResult<PollTally> {
        let (option, poll) = self.poll_repo.get_option_with_poll(option_id).await?;
        self.ensure_open(&poll)?;

        let outcome = self
            .poll_repo
            .cast_vote(poll.id, option.id, user_id, self.clock.now().fixed_offset())
            .await?;

        match outcome.change {
            VoteChange::Unchanged => {
                tracing::debug!(user_id, poll_id = poll.id, option_id, "Vote unchanged");
            }
            VoteChange::Cast => {
                tracing::info!(user_id, poll_id = poll.id, option_id, "Vote cast");
            }
            VoteChange::Switch { from } => {
                tracing::info!(user_id, poll_id = poll.id, from, to = option_id, "Vote switched");
            }
        }

        self.publish_tally(&poll).await
    }

    /// Withdraw the user's vote on the poll `option_id` belongs to.
    ///
    /// The decremented option is the one the stored vote points at, which
    /// need not be `option_id`.
    pub async fn unvote(&self, user_id: i64, option_id: i64) -> AppResult<PollTally> {
        let (_, poll) = self.poll_repo.get_option_with_poll(option_id).await?;
        self.ensure_open(&poll)?;

        if let Some(from) = self.poll_repo.remove_vote(poll.id, user_id).await? {
            tracing::info!(user_id, poll_id = poll.id, from, "Vote withdrawn");
        }

        self.publish_tally(&poll).await
    }

    /// Start a new poll from the chat and announce it as a chat message.
    ///
    /// A new poll is created every time, even when today already has one.
    pub async fn create_from_chat(
        &self,
        author: &user::Model,
        title: Option<&str>,
        options: &[String],
    ) -> AppResult<(PollTally, ChatMessageView)> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        if let Some(t) = title
            && t.chars().count() > MAX_TITLE_CHARS
        {
            return Err(AppError::field(
                "title",
                "The title field must not be greater than 120 characters.",
            ));
        }

        let names = clean_options(options);
        if names.is_empty() {
            return Err(AppError::field(
                "options",
                "The options field must have at least 1 items.",
            ));
        }
        if let Some(i) = names.iter().position(|n| n.chars().count() > MAX_OPTION_CHARS) {
            return Err(AppError::field(
                format!("options.{i}"),
                "The option must not be greater than 120 characters.",
            ));
        }

        let chat_week = IsoWeek::from_date(self.clock.today());
        let created_at = self.clock.now().fixed_offset();
        let (poll, created_options, message) = self
            .poll_repo
            .create_announced(
                self.new_poll(title.map(ToString::to_string)),
                names.into_iter().map(|n| (n, None)).collect(),
                |poll, options| {
                    let card = PollCard {
                        poll_id: poll.id,
                        title: poll.title.clone(),
                        options: options.iter().map(tally_of).collect(),
                        user_vote_option_id: None,
                    };
                    let payload = serde_json::to_value(&card)
                        .map_err(|e| AppError::Internal(e.to_string()))?;
                    Ok(chat_message::ActiveModel {
                        user_id: Set(author.id),
                        iso_week: Set(chat_week.as_str().to_string()),
                        kind: Set(chat_message::ChatMessageKind::Poll),
                        payload: Set(Some(payload)),
                        body: Set(None),
                        created_at: Set(created_at),
                        ..Default::default()
                    })
                },
            )
            .await?;

        let tally = PollTally {
            id: poll.id,
            options: created_options.iter().map(tally_of).collect(),
        };

        tracing::info!(
            user_id = author.id,
            poll_id = poll.id,
            message_id = message.id,
            options = tally.options.len(),
            "Poll created from chat"
        );

        let view = message_view(message, Some(author.clone()));
        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::ChatMessagePosted {
                iso_week: chat_week,
                message: view.clone(),
            },
        )
        .await;
        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::PollUpdated {
                iso_week: IsoWeek::from_date(poll.poll_date),
                poll: tally.clone(),
            },
        )
        .await;

        Ok((tally, view))
    }

    fn ensure_open(&self, poll: &poll::Model) -> AppResult<()> {
        if self.settings.enforce_deadline && self.status(poll) == PollStatus::Closed {
            tracing::debug!(poll_id = poll.id, "Rejected vote on closed poll");
            return Err(AppError::VotingClosed {
                deadline: deadline_label(poll.deadline),
            });
        }
        Ok(())
    }

    async fn publish_tally(&self, poll: &poll::Model) -> AppResult<PollTally> {
        let tally = self.tally(poll.id).await?;
        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::PollUpdated {
                iso_week: IsoWeek::from_date(poll.poll_date),
                poll: tally.clone(),
            },
        )
        .await;
        Ok(tally)
    }

    fn new_poll(&self, title: Option<String>) -> poll::ActiveModel {
        let now = self.clock.now().fixed_offset();
        poll::ActiveModel {
            poll_date: Set(self.clock.today()),
            deadline: Set(self.settings.deadline),
            is_active: Set(true),
            title: Set(title),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }
}
