//! Chat Log: the week chat and its daily visibility window.

use std::collections::{BTreeSet, HashMap};

use crate::services::event_publisher::{EventPublisherService, publish_best_effort};
use chrono::{DateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use lunchsync_common::{
    AppError, AppResult, ChatAuthor, ChatMessageView, IsoWeek, LocalClock, LunchEvent,
    MessageKind, PollCard, PollOptionTally, config::LunchConfig,
};
use lunchsync_db::{
    entities::{chat_message, poll_option, user, vote},
    repositories::{ChatMessageRepository, PollRepository},
};
use sea_orm::Set;

/// Longest accepted message body.
pub const MAX_BODY_CHARS: usize = 5000;

/// Chat tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// Local time-of-day at which the visible chat resets.
    pub reset_at: NaiveTime,
    /// Most messages returned in a snapshot.
    pub history_limit: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            reset_at: NaiveTime::from_hms_opt(13, 15, 0).unwrap_or(NaiveTime::MIN),
            history_limit: 100,
        }
    }
}

impl ChatSettings {
    /// Read from the `lunch` config section.
    pub fn from_config(config: &LunchConfig) -> AppResult<Self> {
        Ok(Self {
            reset_at: config.chat_reset_time()?,
            history_limit: config.chat_history_limit,
        })
    }
}

/// Earliest creation time still visible at `now`.
///
/// Before `reset_at` the window starts at local midnight, afterwards at
/// `reset_at` itself.
#[must_use]
pub fn visibility_window_start(now: DateTime<Tz>, reset_at: NaiveTime) -> DateTime<Tz> {
    let today = now.date_naive();
    let reset = today.and_time(reset_at);
    let start = if now.naive_local() >= reset {
        reset
    } else {
        today.and_time(NaiveTime::MIN)
    };

    now.timezone()
        .from_local_datetime(&start)
        .earliest()
        .unwrap_or(now)
}

/// Public view of a stored message.
#[must_use]
pub fn message_view(message: chat_message::Model, author: Option<user::Model>) -> ChatMessageView {
    let user = author.map_or_else(
        || ChatAuthor {
            id: message.user_id,
            name: String::new(),
            avatar: None,
        },
        |u| ChatAuthor {
            id: u.id,
            name: u.name,
            avatar: u.avatar,
        },
    );

    match message.kind {
        chat_message::ChatMessageKind::Text => ChatMessageView {
            id: message.id,
            kind: MessageKind::Text,
            body: Some(message.body.unwrap_or_default()),
            payload: None,
            created_at: message.created_at,
            user,
        },
        chat_message::ChatMessageKind::Poll => {
            let payload = message.payload.and_then(|raw| {
                serde_json::from_value::<PollCard>(raw)
                    .map_err(|e| {
                        tracing::warn!(error = %e, message_id = message.id, "Unreadable poll payload");
                    })
                    .ok()
            });
            ChatMessageView {
                id: message.id,
                kind: MessageKind::Poll,
                body: None,
                payload,
                created_at: message.created_at,
                user,
            }
        }
    }
}

/// Overwrite embedded poll snapshots with live tallies and the viewer's
/// choice. Polls with no live options keep their snapshot.
#[must_use]
pub fn refresh_poll_cards(
    mut messages: Vec<ChatMessageView>,
    options: &[poll_option::Model],
    viewer_votes: &[vote::Model],
) -> Vec<ChatMessageView> {
    let mut by_poll: HashMap<i64, Vec<PollOptionTally>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(PollOptionTally {
            id: option.id,
            name: option.name.clone(),
            description: option.description.clone(),
            vote_count: option.vote_count,
        });
    }
    for tallies in by_poll.values_mut() {
        tallies.sort_by_key(|t| t.id);
    }

    let choice: HashMap<i64, i64> = viewer_votes
        .iter()
        .map(|v| (v.poll_id, v.poll_option_id))
        .collect();

    for card in messages.iter_mut().filter_map(|m| m.payload.as_mut()) {
        if let Some(live) = by_poll.get(&card.poll_id) {
            card.options = live.clone();
        }
        card.user_vote_option_id = choice.get(&card.poll_id).copied();
    }

    messages
}

/// Chat service for business logic.
#[derive(Clone)]
pub struct ChatService {
    chat_repo: ChatMessageRepository,
    poll_repo: PollRepository,
    clock: LocalClock,
    settings: ChatSettings,
    event_publisher: Option<EventPublisherService>,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(
        chat_repo: ChatMessageRepository,
        poll_repo: PollRepository,
        clock: LocalClock,
        settings: ChatSettings,
    ) -> Self {
        Self {
            chat_repo,
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

    /// Post a text message to a week's chat.
    pub async fn post(
        &self,
        author: &user::Model,
        iso_week: IsoWeek,
        body: &str,
    ) -> AppResult<ChatMessageView> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::field("body", "The body field is required."));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(AppError::field(
                "body",
                "The body field must not be greater than 5000 characters.",
            ));
        }

        let created = self
            .chat_repo
            .create(chat_message::ActiveModel {
                user_id: Set(author.id),
                iso_week: Set(iso_week.as_str().to_string()),
                kind: Set(chat_message::ChatMessageKind::Text),
                payload: Set(None),
                body: Set(Some(body.to_string())),
                created_at: Set(self.clock.now().fixed_offset()),
                ..Default::default()
            })
            .await?;

        tracing::info!(user_id = author.id, iso_week = %iso_week, message_id = created.id, "Chat message posted");

        let view = message_view(created, Some(author.clone()));
        publish_best_effort(
            self.event_publisher.as_ref(),
            LunchEvent::ChatMessagePosted {
                iso_week,
                message: view.clone(),
            },
        )
        .await;

        Ok(view)
    }

    /// Messages of `iso_week` inside today's visibility window, oldest first,
    /// with live poll tallies for `viewer_id`.
    pub async fn list_visible(
        &self,
        iso_week: &IsoWeek,
        viewer_id: i64,
    ) -> AppResult<Vec<ChatMessageView>> {
        let since = visibility_window_start(self.clock.now(), self.settings.reset_at);

        let rows = self
            .chat_repo
            .find_recent_since(
                iso_week.as_str(),
                since.fixed_offset(),
                self.settings.history_limit,
            )
            .await?;

        let messages = rows
            .into_iter()
            .map(|(message, author)| message_view(message, author))
            .collect();

        self.enrich_poll_messages(messages, viewer_id).await
    }

    /// Refresh every embedded poll in `messages` from live state.
    pub async fn enrich_poll_messages(
        &self,
        messages: Vec<ChatMessageView>,
        viewer_id: i64,
    ) -> AppResult<Vec<ChatMessageView>> {
        let poll_ids: Vec<i64> = messages
            .iter()
            .filter_map(|m| m.payload.as_ref().map(|p| p.poll_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if poll_ids.is_empty() {
            return Ok(messages);
        }

        let options = self.poll_repo.find_options_for_polls(&poll_ids).await?;
        let votes = self.poll_repo.find_user_votes(&poll_ids, viewer_id).await?;

        Ok(refresh_poll_cards(messages, &options, &votes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Stockholm;
    use lunchsync_common::ManualClock;
    use lunchsync_db::entities::chat_message::ChatMessageKind;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;
    use std::sync::Arc;

    use crate::services::event_publisher::RecordingEventPublisher;

    fn local(h: u32, m: u32) -> DateTime<Tz> {
        Stockholm.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
    }

    fn create_test_user() -> user::Model {
        user::Model {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            avatar: None,
            api_token: None,
            created_at: Utc::now().into(),
        }
    }

    fn poll_message(id: i64, poll_id: i64) -> ChatMessageView {
        message_view(
            chat_message::Model {
                id,
                user_id: 1,
                iso_week: "2025-W03".to_string(),
                kind: ChatMessageKind::Poll,
                payload: Some(json!({
                    "poll_id": poll_id,
                    "title": "Lunch?",
                    "options": [{"id": 1, "name": "Old name", "description": null, "vote_count": 0}]
                })),
                body: Some(String::new()),
                created_at: Utc::now().into(),
            },
            Some(create_test_user()),
        )
    }

    fn live_option(id: i64, poll_id: i64, votes: i32) -> poll_option::Model {
        poll_option::Model {
            id,
            poll_id,
            name: format!("Option {id}"),
            description: None,
            vote_count: votes,
        }
    }

    #[test]
    fn test_window_before_reset_starts_at_midnight() {
        let start = visibility_window_start(local(13, 14), NaiveTime::from_hms_opt(13, 15, 0).unwrap());
        assert_eq!(start, local(0, 0));
    }

    #[test]
    fn test_window_at_reset_starts_at_reset() {
        let reset = NaiveTime::from_hms_opt(13, 15, 0).unwrap();
        assert_eq!(visibility_window_start(local(13, 15), reset), local(13, 15));
        assert_eq!(visibility_window_start(local(18, 0), reset), local(13, 15));
    }

    #[test]
    fn test_text_view_has_minimal_shape() {
        let view = message_view(
            chat_message::Model {
                id: 5,
                user_id: 1,
                iso_week: "2025-W03".to_string(),
                kind: ChatMessageKind::Text,
                payload: None,
                body: Some("hello".to_string()),
                created_at: Utc::now().into(),
            },
            Some(create_test_user()),
        );

        assert_eq!(view.kind, MessageKind::Text);
        assert_eq!(view.body.as_deref(), Some("hello"));
        assert_eq!(view.user.name, "Alice");
        assert!(view.payload.is_none());
    }

    #[test]
    fn test_refresh_overwrites_snapshot_in_id_order() {
        let messages = vec![poll_message(1, 10), poll_message(2, 20)];
        let options = vec![live_option(4, 10, 1), live_option(3, 10, 2)];
        let votes = vec![vote::Model {
            id: 1,
            user_id: 1,
            poll_id: 10,
            poll_option_id: 4,
            created_at: Utc::now().into(),
        }];

        let refreshed = refresh_poll_cards(messages, &options, &votes);

        let first = refreshed[0].payload.as_ref().unwrap();
        assert_eq!(first.options.iter().map(|o| o.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(first.user_vote_option_id, Some(4));

        // Poll 20 has no live options: snapshot kept, no choice
        let second = refreshed[1].payload.as_ref().unwrap();
        assert_eq!(second.options[0].name, "Old name");
        assert_eq!(second.user_vote_option_id, None);
    }

    fn service_with(db: sea_orm::DatabaseConnection) -> (ChatService, RecordingEventPublisher) {
        let db = Arc::new(db);
        let clock = LocalClock::new(
            Arc::new(ManualClock::new(local(12, 0).with_timezone(&Utc))),
            Stockholm,
        );
        let recorder = RecordingEventPublisher::new();
        let mut service = ChatService::new(
            ChatMessageRepository::new(db.clone()),
            PollRepository::new(db),
            clock,
            ChatSettings::default(),
        );
        service.set_event_publisher(Arc::new(recorder.clone()));
        (service, recorder)
    }

    #[tokio::test]
    async fn test_post_rejects_blank_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, recorder) = service_with(db);

        let result = service
            .post(&create_test_user(), "2025-W03".parse().unwrap(), "   ")
            .await;

        assert!(matches!(result, Err(AppError::InvalidFields(ref f)) if f.contains_key("body")));
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_post_rejects_long_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, _) = service_with(db);

        let result = service
            .post(&create_test_user(), "2025-W03".parse().unwrap(), &"a".repeat(5001))
            .await;

        assert!(matches!(result, Err(AppError::InvalidFields(_))));
    }

    #[tokio::test]
    async fn test_post_publishes_to_week_channel() {
        let stored = chat_message::Model {
            id: 9,
            user_id: 1,
            iso_week: "2025-W03".to_string(),
            kind: ChatMessageKind::Text,
            payload: None,
            body: Some("Sushi at 12?".to_string()),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored]])
            .into_connection();
        let (service, recorder) = service_with(db);

        let view = service
            .post(&create_test_user(), "2025-W03".parse().unwrap(), "  Sushi at 12?  ")
            .await
            .unwrap();

        assert_eq!(view.id, 9);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "ChatMessagePosted");
        assert_eq!(events[0].channel(), "week-status.2025-W03");
    }

    #[tokio::test]
    async fn test_enrich_without_polls_skips_queries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, _) = service_with(db);

        let out = service.enrich_poll_messages(Vec::new(), 1).await.unwrap();
        assert!(out.is_empty());
    }
}
