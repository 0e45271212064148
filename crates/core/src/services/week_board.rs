//! Week board snapshot served on first page load.

use crate::services::chat::ChatService;
use crate::services::poll::{PollService, PollStatus};
use crate::services::week_status::WeekStatusService;
use chrono::NaiveDate;
use lunchsync_common::{
    AppResult, BoardUser, IsoWeek, LocalClock, WeekBoard,
    week::{is_workday, iso_weekday},
};
use lunchsync_db::{entities::user, repositories::UserRepository};

/// Week to show when none is requested: the current one on workdays, the
/// next one on weekends.
#[must_use]
pub fn resolve_week(requested: Option<IsoWeek>, today: NaiveDate) -> IsoWeek {
    if let Some(week) = requested {
        return week;
    }
    let current = IsoWeek::from_date(today);
    if is_workday(today) {
        return current;
    }
    current.next().unwrap_or(current)
}

/// Weekday column to focus: today on workdays, Monday otherwise.
#[must_use]
pub fn active_weekday(today: NaiveDate) -> u8 {
    if is_workday(today) {
        iso_weekday(today)
    } else {
        1
    }
}

/// Viewer first, everyone else by name.
#[must_use]
pub fn order_users(users: Vec<user::Model>, viewer_id: i64) -> Vec<BoardUser> {
    let (mut ordered, mut rest): (Vec<_>, Vec<_>) =
        users.into_iter().partition(|u| u.id == viewer_id);
    rest.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    ordered.append(&mut rest);

    ordered
        .into_iter()
        .map(|u| BoardUser {
            id: u.id,
            name: u.name,
            email: u.email,
            avatar: u.avatar,
        })
        .collect()
}

/// Assembles [`WeekBoard`] snapshots.
#[derive(Clone)]
pub struct WeekBoardService {
    user_repo: UserRepository,
    status_service: WeekStatusService,
    chat_service: ChatService,
    poll_service: PollService,
    clock: LocalClock,
}

impl WeekBoardService {
    /// Create a new week board service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        status_service: WeekStatusService,
        chat_service: ChatService,
        poll_service: PollService,
        clock: LocalClock,
    ) -> Self {
        Self {
            user_repo,
            status_service,
            chat_service,
            poll_service,
            clock,
        }
    }

    /// Snapshot of `week` (or the default week) as seen by `viewer_id`.
    ///
    /// Today's poll is shown only if it already exists.
    pub async fn board(&self, viewer_id: i64, week: Option<IsoWeek>) -> AppResult<WeekBoard> {
        let today = self.clock.today();
        let week = resolve_week(week, today);

        let users = order_users(self.user_repo.find_all_by_name().await?, viewer_id);
        let statuses = self.status_service.statuses_by_user(&week).await?;
        let chat_messages = self.chat_service.list_visible(&week, viewer_id).await?;

        let (poll, user_vote, is_voting_open) = match self.poll_service.today_poll().await? {
            Some(today_poll) => {
                let view = self.poll_service.leaderboard(&today_poll).await?;
                let vote = self.poll_service.user_vote(today_poll.id, viewer_id).await?;
                let open = self.poll_service.status(&today_poll) == PollStatus::Open;
                (Some(view), vote, Some(open))
            }
            None => (None, None, None),
        };

        tracing::debug!(
            viewer_id,
            iso_week = %week,
            users = users.len(),
            messages = chat_messages.len(),
            "Week board assembled"
        );

        Ok(WeekBoard {
            week,
            active_weekday: active_weekday(today),
            users,
            statuses,
            can_edit_user_id: viewer_id,
            chat_messages,
            poll,
            user_vote,
            is_voting_open,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::chat::ChatSettings;
    use crate::services::poll::PollSettings;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Stockholm;
    use lunchsync_common::ManualClock;
    use lunchsync_db::entities::{day_status, poll, poll_option};
    use lunchsync_db::repositories::{
        ChatMessageRepository, DayStatusRepository, MessageWithAuthor, PollRepository,
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn create_test_user(id: i64, name: &str) -> user::Model {
        user::Model {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar: None,
            api_token: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_resolve_week_on_workday_and_weekend() {
        // Wednesday
        assert_eq!(resolve_week(None, d(2025, 1, 15)).as_str(), "2025-W03");
        // Saturday and Sunday roll forward
        assert_eq!(resolve_week(None, d(2025, 1, 18)).as_str(), "2025-W04");
        assert_eq!(resolve_week(None, d(2025, 1, 19)).as_str(), "2025-W04");
        // Year boundary
        assert_eq!(resolve_week(None, d(2020, 12, 27)).as_str(), "2020-W53");
        assert_eq!(resolve_week(None, d(2021, 1, 2)).as_str(), "2021-W01");
    }

    #[test]
    fn test_requested_week_wins() {
        let requested: IsoWeek = "2024-W10".parse().unwrap();
        assert_eq!(resolve_week(Some(requested.clone()), d(2025, 1, 18)), requested);
    }

    #[test]
    fn test_active_weekday() {
        assert_eq!(active_weekday(d(2025, 1, 13)), 1);
        assert_eq!(active_weekday(d(2025, 1, 17)), 5);
        assert_eq!(active_weekday(d(2025, 1, 19)), 1);
    }

    #[test]
    fn test_order_users_viewer_first() {
        let users = vec![
            create_test_user(1, "Anna"),
            create_test_user(2, "Bertil"),
            create_test_user(3, "Cecilia"),
        ];

        let ordered: Vec<_> = order_users(users, 2).into_iter().map(|u| u.id).collect();
        assert_eq!(ordered, vec![2, 1, 3]);
    }

    fn board_service(db: DatabaseConnection) -> WeekBoardService {
        let db = Arc::new(db);
        let now = Stockholm
            .with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let clock = LocalClock::new(Arc::new(ManualClock::new(now)), Stockholm);
        let poll_repo = PollRepository::new(db.clone());
        let chat_repo = ChatMessageRepository::new(db.clone());

        WeekBoardService::new(
            UserRepository::new(db.clone()),
            WeekStatusService::new(DayStatusRepository::new(db), clock.clone()),
            ChatService::new(
                chat_repo,
                poll_repo.clone(),
                clock.clone(),
                ChatSettings::default(),
            ),
            PollService::new(poll_repo, clock.clone(), PollSettings::default()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_board_without_poll() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(1, "Anna"), create_test_user(2, "Bertil")]])
            .append_query_results([Vec::<day_status::Model>::new()])
            .append_query_results([Vec::<MessageWithAuthor>::new()])
            .append_query_results([Vec::<poll::Model>::new()])
            .into_connection();
        let service = board_service(db);

        let board = service.board(2, None).await.unwrap();

        assert_eq!(board.week.as_str(), "2025-W03");
        assert_eq!(board.active_weekday, 3);
        assert_eq!(board.users[0].id, 2);
        assert_eq!(board.can_edit_user_id, 2);
        assert!(board.poll.is_none());
        assert!(board.is_voting_open.is_none());
    }

    #[tokio::test]
    async fn test_board_with_closed_poll() {
        let poll = poll::Model {
            id: 9,
            poll_date: d(2025, 1, 15),
            deadline: chrono::NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            is_active: true,
            title: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let option = poll_option::Model {
            id: 1,
            poll_id: 9,
            name: "Sushi Spot".to_string(),
            description: None,
            vote_count: 2,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user(1, "Anna")]])
            .append_query_results([Vec::<day_status::Model>::new()])
            .append_query_results([Vec::<MessageWithAuthor>::new()])
            .append_query_results([[poll]])
            .append_query_results([[option]])
            .append_query_results([Vec::<lunchsync_db::entities::vote::Model>::new()])
            .into_connection();
        let service = board_service(db);

        let board = service.board(1, None).await.unwrap();

        assert_eq!(board.poll.unwrap().options[0].vote_count, 2);
        assert!(board.user_vote.is_none());
        assert_eq!(board.is_voting_open, Some(false));
    }
}
