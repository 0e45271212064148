//! Reconciler flows against an in-memory gateway.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use lunchsync_client::{
    Applied, ChatComposer, ClearRequest, ClientError, ClientResult, CreatedPoll, Gateway,
    PollComposer, Reconciler, StatusWrite, WeekEditor,
};
use lunchsync_common::{
    ChatAuthor, ChatMessageView, DayStatusRow, EventEnvelope, IsoWeek, LunchStatus, MessageKind,
    PollOptionTally, PollPage, PollTally, PollView, UserVote, WeekBoard,
};
use serde_json::json;

#[derive(Default)]
struct FakeGateway {
    calls: Mutex<Vec<String>>,
    fail_votes: bool,
    fail_board: bool,
    fail_weekdays: Vec<u8>,
    board: Option<WeekBoard>,
    vote_tally: Option<PollTally>,
}

impl FakeGateway {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn row_for(write: &StatusWrite) -> DayStatusRow {
    DayStatusRow {
        id: 100 + i64::from(write.weekday),
        user_id: 1,
        weekday: write.weekday,
        status: write.status,
        arrival_time: write.arrival_time.clone(),
        location: write.location.clone(),
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn board(&self, week: Option<&IsoWeek>) -> ClientResult<WeekBoard> {
        self.record(format!("board {}", week.map_or("-", IsoWeek::as_str)));
        if self.fail_board {
            return Err(ClientError::Rejected {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.board.clone().unwrap_or_else(board))
    }

    async fn poll_page(&self) -> ClientResult<PollPage> {
        Err(ClientError::Refused("poll page is not used by these flows"))
    }

    async fn save_status(&self, write: &StatusWrite) -> ClientResult<DayStatusRow> {
        self.record(format!("save {}", write.weekday));
        if self.fail_weekdays.contains(&write.weekday) {
            return Err(ClientError::Rejected {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(row_for(write))
    }

    async fn clear_status(&self, request: &ClearRequest) -> ClientResult<bool> {
        self.record(format!("clear {}", request.weekday));
        Ok(true)
    }

    async fn post_chat(&self, iso_week: &IsoWeek, body: &str) -> ClientResult<ChatMessageView> {
        self.record(format!("chat {iso_week} {body}"));
        Ok(text_message(77, body))
    }

    async fn vote(&self, poll_option_id: i64) -> ClientResult<PollTally> {
        self.record(format!("vote {poll_option_id}"));
        if self.fail_votes {
            return Err(ClientError::VotingClosed(
                "Voting has closed for today. The deadline was 11:00 AM.".to_string(),
            ));
        }
        Ok(self.vote_tally.clone().unwrap_or(PollTally {
            id: 9,
            options: vec![],
        }))
    }

    async fn unvote(&self, poll_option_id: i64) -> ClientResult<PollTally> {
        self.record(format!("unvote {poll_option_id}"));
        Ok(PollTally {
            id: 9,
            options: vec![],
        })
    }

    async fn create_poll(
        &self,
        title: Option<&str>,
        options: &[String],
    ) -> ClientResult<CreatedPoll> {
        self.record(format!("poll {:?} {}", title, options.join("|")));
        Ok(CreatedPoll {
            poll: PollTally {
                id: 10,
                options: vec![],
            },
            message: text_message(78, ""),
        })
    }
}

fn option(id: i64, votes: i32) -> PollOptionTally {
    PollOptionTally {
        id,
        name: format!("Option {id}"),
        description: None,
        vote_count: votes,
    }
}

fn text_message(id: i64, body: &str) -> ChatMessageView {
    ChatMessageView {
        id,
        kind: MessageKind::Text,
        body: Some(body.to_string()),
        payload: None,
        created_at: DateTime::parse_from_rfc3339("2025-01-15T10:00:00+01:00").unwrap(),
        user: ChatAuthor {
            id: 1,
            name: "Alice".to_string(),
            avatar: None,
        },
    }
}

fn board() -> WeekBoard {
    WeekBoard {
        week: "2025-W03".parse().unwrap(),
        active_weekday: 3,
        users: vec![],
        statuses: BTreeMap::new(),
        can_edit_user_id: 1,
        chat_messages: vec![],
        poll: Some(PollView {
            id: 9,
            poll_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            deadline: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            is_active: true,
            title: None,
            options: vec![option(1, 1), option(2, 0)],
        }),
        user_vote: None,
        is_voting_open: Some(true),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn write(weekday: u8) -> StatusWrite {
    StatusWrite {
        iso_week: "2025-W03".parse().unwrap(),
        weekday,
        status: Some(LunchStatus::Lunchbox),
        arrival_time: Some("12:00".to_string()),
        location: Some("Bulten".to_string()),
    }
}

#[tokio::test]
async fn test_status_event_from_another_user_updates_grid() {
    let mut rec = Reconciler::from_board(board(), today());

    let envelope = EventEnvelope {
        channel: "week-status.2025-W03".to_string(),
        event: "WeekStatusUpdated".to_string(),
        data: json!({
            "isoWeek": "2025-W03",
            "userId": 2,
            "weekday": 3,
            "status": "Lunchbox",
            "arrivalTime": "12:00",
            "location": "Bulten"
        }),
    };

    assert_eq!(rec.apply_envelope(&envelope).unwrap(), Applied::Status);
    let cell = rec.statuses().get(2, 3).unwrap();
    assert_eq!(cell.status, Some(LunchStatus::Lunchbox));
    assert_eq!(cell.arrival_time.as_deref(), Some("12:00"));
    assert_eq!(cell.location.as_deref(), Some("Bulten"));
}

#[tokio::test]
async fn test_malformed_envelope_is_an_error() {
    let mut rec = Reconciler::from_board(board(), today());
    let envelope = EventEnvelope {
        channel: "week-status.2025-W03".to_string(),
        event: "WeekStatusUpdated".to_string(),
        data: json!({"weekday": "Monday"}),
    };

    assert!(matches!(
        rec.apply_envelope(&envelope),
        Err(ClientError::Protocol(_))
    ));
}

#[tokio::test]
async fn test_vote_success_reloads_board() {
    let mut fresh = board();
    fresh.poll.as_mut().unwrap().options = vec![option(2, 1), option(1, 1)];
    fresh.user_vote = Some(UserVote {
        id: 5,
        poll_id: 9,
        poll_option_id: 2,
    });
    let gateway = FakeGateway {
        board: Some(fresh.clone()),
        ..FakeGateway::default()
    };
    let mut rec = Reconciler::from_board(board(), today());

    rec.vote(&gateway, 9, 2).await.unwrap();

    assert_eq!(gateway.calls(), vec!["vote 2", "board 2025-W03"]);
    assert_eq!(rec.polls().today, fresh.poll);
    assert_eq!(rec.polls().user_vote, fresh.user_vote);
}

#[tokio::test]
async fn test_vote_failure_restores_previous_tallies() {
    let gateway = FakeGateway {
        fail_votes: true,
        ..FakeGateway::default()
    };
    let mut rec = Reconciler::from_board(board(), today());
    let before = rec.polls().clone();

    let result = rec.vote(&gateway, 9, 2).await;

    assert!(matches!(result, Err(ClientError::VotingClosed(_))));
    assert_eq!(rec.polls(), &before);
    assert_eq!(gateway.calls(), vec!["vote 2"]);
}

#[tokio::test]
async fn test_vote_kept_when_board_reload_fails() {
    let gateway = FakeGateway {
        fail_board: true,
        vote_tally: Some(PollTally {
            id: 9,
            options: vec![option(1, 2), option(2, 1)],
        }),
        ..FakeGateway::default()
    };
    let mut rec = Reconciler::from_board(board(), today());

    rec.vote(&gateway, 9, 2).await.unwrap();

    assert_eq!(gateway.calls(), vec!["vote 2", "board 2025-W03"]);
    let counts: Vec<i32> = rec
        .polls()
        .today
        .as_ref()
        .unwrap()
        .options
        .iter()
        .map(|o| o.vote_count)
        .collect();
    assert_eq!(counts, vec![2, 1]);
    assert_eq!(rec.selection(9), Some(2));
    assert_eq!(rec.polls().user_vote.unwrap().poll_option_id, 2);
}

#[tokio::test]
async fn test_failed_status_save_restores_cell() {
    let gateway = FakeGateway {
        fail_weekdays: vec![2],
        ..FakeGateway::default()
    };
    let mut rec = Reconciler::from_board(board(), today());

    assert!(rec.submit_status(&gateway, &write(2)).await.is_err());
    assert!(rec.statuses().get(1, 2).is_none());

    rec.submit_status(&gateway, &write(3)).await.unwrap();
    assert_eq!(
        rec.statuses().get(1, 3).unwrap().location.as_deref(),
        Some("Bulten")
    );
}

#[tokio::test(start_paused = true)]
async fn test_coming_days_are_staggered_and_reported() {
    let gateway = FakeGateway {
        fail_weekdays: vec![4],
        ..FakeGateway::default()
    };
    let mut rec = Reconciler::from_board(board(), today());
    rec.submit_status(&gateway, &write(2)).await.unwrap();

    let clock = std::sync::Arc::new(lunchsync_common::SystemClock);
    let editor = WeekEditor::new(1, rec.week().clone(), clock);
    let plan = editor.plan_coming_days(2, rec.statuses().rows_of(1));

    let started = tokio::time::Instant::now();
    let report = rec.submit_coming_days(&gateway, &plan).await;

    assert_eq!(report.saved, vec![3, 5]);
    assert_eq!(report.failed, vec![4]);
    assert_eq!(started.elapsed().as_millis(), 500);
    assert_eq!(
        gateway.calls(),
        vec!["save 2", "save 3", "save 4", "save 5"]
    );
}

#[tokio::test]
async fn test_chat_composer_waits_for_event_to_show_message() {
    let gateway = FakeGateway::default();
    let mut rec = Reconciler::from_board(board(), today());
    let mut composer = ChatComposer {
        draft: "   ".to_string(),
    };

    assert!(matches!(
        composer.submit(&gateway, rec.week()).await,
        Err(ClientError::Refused(_))
    ));
    assert!(gateway.calls().is_empty());

    composer.draft = "  lunch at 12? ".to_string();
    let sent = composer.submit(&gateway, rec.week()).await.unwrap();
    assert!(composer.draft.is_empty());
    assert!(rec.chat().messages().is_empty());
    assert_eq!(gateway.calls(), vec!["chat 2025-W03 lunch at 12?"]);

    let envelope = EventEnvelope {
        channel: "week-status.2025-W03".to_string(),
        event: "ChatMessagePosted".to_string(),
        data: serde_json::to_value(&sent).unwrap(),
    };
    assert_eq!(rec.apply_envelope(&envelope).unwrap(), Applied::Chat);
    assert_eq!(rec.chat().messages().len(), 1);
}

#[tokio::test]
async fn test_poll_composer_sends_cleaned_options() {
    let gateway = FakeGateway::default();
    let mut composer = PollComposer::default();

    assert!(composer.submit(&gateway).await.is_err());

    composer.set_option(0, "Pizza");
    composer.set_option(1, " ");
    composer.set_option(2, " Sushi ");
    composer.submit(&gateway).await.unwrap();

    assert_eq!(gateway.calls(), vec!["poll None Pizza|Sushi"]);
    assert_eq!(composer, PollComposer::default());
}
