//! The client-side reconciler.
//!
//! [`Reconciler`] owns the local mirrors of one week board, decides which
//! push channels to listen on, routes incoming events to the right merge
//! function and runs optimistic votes.
//!
//! Votes are split into [`Reconciler::begin_vote`] and
//! [`Reconciler::settle`] so push events can keep arriving while the
//! request is in flight. On success the poll state is reloaded from the
//! server, falling back to the tallies the vote call returned when the
//! reload fails. A rejected vote restores the snapshot taken at click time,
//! never patched.

use std::collections::HashMap;

use chrono::NaiveDate;
use lunchsync_common::{
    DayStatusRow, EventEnvelope, IsoWeek, LunchEvent, PollCard, PollOptionTally, PollTally,
    UserVote, WeekBoard,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::editor::{ComingDaysPlan, StatusWrite};
use crate::error::ClientResult;
use crate::gateway::Gateway;
use crate::mirror::{ChatMirror, PollMirror, StatusMirror, apply_to_chat, merge_options};

/// Channels a board view listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    /// The viewed week's channel; every event is applied.
    pub week: String,
    /// Today's channel when it differs; only poll tallies are applied.
    pub today: Option<String>,
}

impl ChannelPlan {
    /// Plan for viewing `week` on `today`.
    #[must_use]
    pub fn new(week: &IsoWeek, today: NaiveDate) -> Self {
        let today_week = IsoWeek::from_date(today);
        Self {
            week: week.channel(),
            today: (today_week != *week).then(|| today_week.channel()),
        }
    }

    /// Every channel to subscribe to.
    #[must_use]
    pub fn channels(&self) -> Vec<&str> {
        std::iter::once(self.week.as_str())
            .chain(self.today.as_deref())
            .collect()
    }
}

/// What [`Reconciler::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Merged into the status mirror.
    Status,
    /// Appended to the chat.
    Chat,
    /// Merged into poll tallies.
    Poll,
    /// Not meant for this view.
    Ignored,
}

/// Outcome of [`Reconciler::submit_coming_days`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComingDaysReport {
    /// Weekdays saved.
    pub saved: Vec<u8>,
    /// Weekdays whose write failed.
    pub failed: Vec<u8>,
}

/// Poll state captured before an optimistic vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSnapshot {
    polls: PollMirror,
    cards: HashMap<i64, PollCard>,
}

/// An optimistic vote awaiting the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending vote must be settled"]
pub struct PendingVote {
    /// Poll voted on.
    pub poll_id: i64,
    /// Option sent to the server.
    pub option_id: i64,
    /// `true` for a withdrawal.
    pub withdraw: bool,
    snapshot: VoteSnapshot,
}

/// Server answer to an accepted vote or withdrawal.
#[derive(Debug)]
pub struct VoteConfirmed {
    /// Tallies returned by the vote call.
    pub tally: PollTally,
    /// The board reloaded afterwards.
    pub board: ClientResult<WeekBoard>,
}

/// Local state of one week board view.
#[derive(Debug, Clone)]
pub struct Reconciler {
    viewer_id: i64,
    week: IsoWeek,
    plan: ChannelPlan,
    statuses: StatusMirror,
    chat: ChatMirror,
    polls: PollMirror,
}

impl Reconciler {
    /// Seed every mirror from a first-load snapshot.
    #[must_use]
    pub fn from_board(board: WeekBoard, today: NaiveDate) -> Self {
        let plan = ChannelPlan::new(&board.week, today);
        Self {
            viewer_id: board.can_edit_user_id,
            week: board.week,
            plan,
            statuses: StatusMirror::new(board.statuses),
            chat: ChatMirror::new(board.chat_messages),
            polls: PollMirror::new(board.poll, board.user_vote, board.is_voting_open),
        }
    }

    /// The viewed week.
    #[must_use]
    pub const fn week(&self) -> &IsoWeek {
        &self.week
    }

    /// The viewer's user id.
    #[must_use]
    pub const fn viewer_id(&self) -> i64 {
        self.viewer_id
    }

    /// Channels to subscribe to.
    #[must_use]
    pub const fn channels(&self) -> &ChannelPlan {
        &self.plan
    }

    /// Status rows.
    #[must_use]
    pub const fn statuses(&self) -> &StatusMirror {
        &self.statuses
    }

    /// Chat messages.
    #[must_use]
    pub const fn chat(&self) -> &ChatMirror {
        &self.chat
    }

    /// Poll state.
    #[must_use]
    pub const fn polls(&self) -> &PollMirror {
        &self.polls
    }

    /// Decode and apply an envelope received on a subscribed channel.
    pub fn apply_envelope(&mut self, envelope: &EventEnvelope) -> ClientResult<Applied> {
        let event = LunchEvent::from_envelope(envelope)?;
        Ok(self.apply(&event))
    }

    /// Route an event to its merge function.
    ///
    /// Events for the viewed week are all applied. From today's channel only
    /// poll tallies are taken.
    pub fn apply(&mut self, event: &LunchEvent) -> Applied {
        let for_view = *event.iso_week() == self.week;
        match event {
            LunchEvent::StatusChanged(changed) if for_view => {
                self.statuses.apply(changed);
                Applied::Status
            }
            LunchEvent::ChatMessagePosted { message, .. } if for_view => {
                self.chat.apply(message.clone());
                Applied::Chat
            }
            LunchEvent::PollUpdated { iso_week, poll }
                if for_view || self.plan.today.as_ref() == Some(&iso_week.channel()) =>
            {
                self.polls.apply(poll);
                apply_to_chat(&mut self.chat, poll);
                Applied::Poll
            }
            _ => {
                debug!(channel = %event.channel(), event = event.name(), "Event not for this view");
                Applied::Ignored
            }
        }
    }

    /// Apply the viewer's own status write ahead of the server echo.
    ///
    /// The echo merges to the same row, so it changes nothing visible.
    pub fn apply_local_status(&mut self, write: &StatusWrite) {
        if write.iso_week == self.week {
            self.statuses.apply(&write.as_event(self.viewer_id));
        }
    }

    /// Save a status write, applying it locally first.
    ///
    /// A failed save puts the previous row back.
    pub async fn submit_status<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        write: &StatusWrite,
    ) -> ClientResult<DayStatusRow> {
        let previous = self.statuses.get(self.viewer_id, write.weekday).cloned();
        self.apply_local_status(write);

        match gateway.save_status(write).await {
            Ok(row) => Ok(row),
            Err(e) => {
                warn!(weekday = write.weekday, error = %e, "Status save failed, restoring cell");
                self.statuses
                    .restore(self.viewer_id, write.weekday, previous);
                Err(e)
            }
        }
    }

    /// Send a coming-days plan, one write per stagger step.
    ///
    /// A failed write is logged and skipped; the rest still go out.
    pub async fn submit_coming_days<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        plan: &ComingDaysPlan,
    ) -> ComingDaysReport {
        let start = Instant::now();
        let mut report = ComingDaysReport::default();

        for step in &plan.writes {
            tokio::time::sleep_until(start + step.delay).await;
            match self.submit_status(gateway, &step.write).await {
                Ok(_) => report.saved.push(step.write.weekday),
                Err(_) => report.failed.push(step.write.weekday),
            }
        }

        info!(
            iso_week = %self.week,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Set for coming days"
        );
        report
    }

    fn snapshot(&self, poll_id: i64) -> VoteSnapshot {
        let cards = self
            .chat
            .messages()
            .iter()
            .filter_map(|m| m.payload.as_ref().map(|card| (m.id, card)))
            .filter(|(_, card)| card.poll_id == poll_id)
            .map(|(id, card)| (id, card.clone()))
            .collect();
        VoteSnapshot {
            polls: self.polls.clone(),
            cards,
        }
    }

    fn restore(&mut self, snapshot: VoteSnapshot) {
        self.polls = snapshot.polls;
        for message in self.chat.messages_mut() {
            if let Some(card) = snapshot.cards.get(&message.id) {
                message.payload = Some(card.clone());
            }
        }
    }

    /// The viewer's current choice on `poll_id`.
    #[must_use]
    pub fn selection(&self, poll_id: i64) -> Option<i64> {
        if let Some(vote) = self.polls.user_vote.filter(|v| v.poll_id == poll_id) {
            return Some(vote.poll_option_id);
        }
        self.chat
            .messages()
            .iter()
            .filter_map(|m| m.payload.as_ref())
            .find(|card| card.poll_id == poll_id)
            .and_then(|card| card.user_vote_option_id)
    }

    fn shift_votes(&mut self, poll_id: i64, from: Option<i64>, to: Option<i64>) {
        let shift = |options: &mut [PollOptionTally]| {
            for option in options.iter_mut() {
                if Some(option.id) == from {
                    option.vote_count = (option.vote_count - 1).max(0);
                }
                if Some(option.id) == to {
                    option.vote_count += 1;
                }
            }
        };

        let vote_id = self.polls.user_vote.map_or(0, |v| v.id);
        if let Some(today) = self.polls.today.as_mut().filter(|p| p.id == poll_id) {
            shift(today.options.as_mut_slice());
            self.polls.user_vote = to.map(|option_id| UserVote {
                id: vote_id,
                poll_id,
                poll_option_id: option_id,
            });
        }
        for card in self
            .chat
            .messages_mut()
            .iter_mut()
            .filter_map(|m| m.payload.as_mut())
            .filter(|card| card.poll_id == poll_id)
        {
            shift(card.options.as_mut_slice());
            card.user_vote_option_id = to;
        }
    }

    /// Optimistically vote for `option_id` on `poll_id`.
    ///
    /// Re-picking the current choice changes nothing locally.
    pub fn begin_vote(&mut self, poll_id: i64, option_id: i64) -> PendingVote {
        let snapshot = self.snapshot(poll_id);
        let current = self.selection(poll_id);
        if current != Some(option_id) {
            self.shift_votes(poll_id, current, Some(option_id));
        }
        PendingVote {
            poll_id,
            option_id,
            withdraw: false,
            snapshot,
        }
    }

    /// Optimistically withdraw the viewer's vote on `poll_id`.
    pub fn begin_unvote(&mut self, poll_id: i64, option_id: i64) -> PendingVote {
        let snapshot = self.snapshot(poll_id);
        let current = self.selection(poll_id);
        if current.is_some() {
            self.shift_votes(poll_id, current, None);
        }
        PendingVote {
            poll_id,
            option_id,
            withdraw: true,
            snapshot,
        }
    }

    /// Finish an optimistic vote.
    ///
    /// An accepted vote takes the reloaded board's poll state. If the reload
    /// failed, the returned tallies are merged and the optimistic selection
    /// stays. A rejected vote restores the click-time snapshot.
    pub fn settle(
        &mut self,
        pending: PendingVote,
        outcome: ClientResult<VoteConfirmed>,
    ) -> ClientResult<()> {
        match outcome {
            Ok(VoteConfirmed {
                board: Ok(board), ..
            }) => {
                self.refresh_polls(&board);
                Ok(())
            }
            Ok(VoteConfirmed {
                tally,
                board: Err(e),
            }) => {
                warn!(poll_id = pending.poll_id, error = %e, "Board reload after vote failed, using returned tallies");
                self.polls.apply(&tally);
                apply_to_chat(&mut self.chat, &tally);
                Ok(())
            }
            Err(e) => {
                info!(poll_id = pending.poll_id, error = %e, "Vote failed, restoring poll state");
                self.restore(pending.snapshot);
                Err(e)
            }
        }
    }

    /// Replace poll state with the server's.
    pub fn refresh_polls(&mut self, board: &WeekBoard) {
        self.polls = PollMirror::new(board.poll.clone(), board.user_vote, board.is_voting_open);

        let fresh: HashMap<i64, &PollCard> = board
            .chat_messages
            .iter()
            .filter_map(|m| m.payload.as_ref().map(|card| (m.id, card)))
            .collect();
        for message in self.chat.messages_mut() {
            let (Some(card), Some(latest)) = (message.payload.as_mut(), fresh.get(&message.id))
            else {
                continue;
            };
            merge_options(&mut card.options, &latest.options);
            card.user_vote_option_id = latest.user_vote_option_id;
        }
    }

    /// Vote end to end: optimistic edit, request, then reload or restore.
    pub async fn vote<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        poll_id: i64,
        option_id: i64,
    ) -> ClientResult<()> {
        let pending = self.begin_vote(poll_id, option_id);
        let outcome = self.send_vote(gateway, &pending).await;
        self.settle(pending, outcome)
    }

    /// Withdraw end to end.
    pub async fn unvote<G: Gateway + ?Sized>(
        &mut self,
        gateway: &G,
        poll_id: i64,
        option_id: i64,
    ) -> ClientResult<()> {
        let pending = self.begin_unvote(poll_id, option_id);
        let outcome = self.send_vote(gateway, &pending).await;
        self.settle(pending, outcome)
    }

    async fn send_vote<G: Gateway + ?Sized>(
        &self,
        gateway: &G,
        pending: &PendingVote,
    ) -> ClientResult<VoteConfirmed> {
        let tally = if pending.withdraw {
            gateway.unvote(pending.option_id).await?
        } else {
            gateway.vote(pending.option_id).await?
        };
        Ok(VoteConfirmed {
            tally,
            board: gateway.board(Some(&self.week)).await,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::error::ClientError;

    use chrono::{DateTime, NaiveTime};
    use lunchsync_common::{ChatAuthor, ChatMessageView, MessageKind, PollView};

    fn option(id: i64, votes: i32) -> PollOptionTally {
        PollOptionTally {
            id,
            name: format!("Option {id}"),
            description: None,
            vote_count: votes,
        }
    }

    fn board() -> WeekBoard {
        WeekBoard {
            week: "2025-W03".parse().unwrap(),
            active_weekday: 3,
            users: vec![],
            statuses: BTreeMap::new(),
            can_edit_user_id: 1,
            chat_messages: vec![ChatMessageView {
                id: 50,
                kind: MessageKind::Poll,
                body: None,
                payload: Some(PollCard {
                    poll_id: 9,
                    title: None,
                    options: vec![option(1, 2), option(2, 0)],
                    user_vote_option_id: Some(1),
                }),
                created_at: DateTime::parse_from_rfc3339("2025-01-15T10:00:00+01:00").unwrap(),
                user: ChatAuthor {
                    id: 2,
                    name: "Bob".to_string(),
                    avatar: None,
                },
            }],
            poll: Some(PollView {
                id: 9,
                poll_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                deadline: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                is_active: true,
                title: None,
                options: vec![option(1, 2), option(2, 0)],
            }),
            user_vote: Some(UserVote {
                id: 70,
                poll_id: 9,
                poll_option_id: 1,
            }),
            is_voting_open: Some(true),
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::from_board(board(), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
    }

    fn counts(options: &[PollOptionTally]) -> Vec<i32> {
        options.iter().map(|o| o.vote_count).collect()
    }

    #[test]
    fn test_channel_plan_same_week() {
        let plan = ChannelPlan::new(
            &"2025-W03".parse().unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        );
        assert_eq!(plan.channels(), vec!["week-status.2025-W03"]);
    }

    #[test]
    fn test_channel_plan_adds_today_when_viewing_other_week() {
        let plan = ChannelPlan::new(
            &"2025-W04".parse().unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        );
        assert_eq!(
            plan.channels(),
            vec!["week-status.2025-W04", "week-status.2025-W03"]
        );
    }

    #[test]
    fn test_today_channel_only_feeds_polls() {
        let mut board = board();
        board.week = "2025-W04".parse().unwrap();
        let mut rec = Reconciler::from_board(board, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        let today: IsoWeek = "2025-W03".parse().unwrap();

        let status = LunchEvent::StatusChanged(lunchsync_common::StatusChanged::cleared(
            today.clone(),
            1,
            1,
        ));
        assert_eq!(rec.apply(&status), Applied::Ignored);

        let poll = LunchEvent::PollUpdated {
            iso_week: today,
            poll: PollTally {
                id: 9,
                options: vec![option(1, 5), option(2, 1)],
            },
        };
        assert_eq!(rec.apply(&poll), Applied::Poll);
        assert_eq!(counts(&rec.polls().today.as_ref().unwrap().options), vec![5, 1]);
        assert_eq!(
            counts(&rec.chat().messages()[0].payload.as_ref().unwrap().options),
            vec![5, 1]
        );
    }

    #[test]
    fn test_begin_vote_switches_selection_everywhere() {
        let mut rec = reconciler();

        let _pending = rec.begin_vote(9, 2);

        assert_eq!(counts(&rec.polls().today.as_ref().unwrap().options), vec![1, 1]);
        let card = rec.chat().messages()[0].payload.as_ref().unwrap();
        assert_eq!(counts(&card.options), vec![1, 1]);
        assert_eq!(card.user_vote_option_id, Some(2));
        assert_eq!(rec.selection(9), Some(2));
        assert_eq!(rec.polls().user_vote.unwrap().id, 70);
    }

    #[test]
    fn test_begin_vote_on_current_choice_is_noop() {
        let mut rec = reconciler();
        let before = rec.polls().clone();

        let _pending = rec.begin_vote(9, 1);

        assert_eq!(rec.polls(), &before);
    }

    #[test]
    fn test_failed_vote_restores_click_time_snapshot() {
        let mut rec = reconciler();
        let before_polls = rec.polls().clone();
        let before_card = rec.chat().messages()[0].payload.clone();

        let pending = rec.begin_vote(9, 2);
        // A tally event lands while the request is in flight.
        rec.apply(&LunchEvent::PollUpdated {
            iso_week: "2025-W03".parse().unwrap(),
            poll: PollTally {
                id: 9,
                options: vec![option(1, 7), option(2, 7)],
            },
        });
        let result = rec.settle(pending, Err(ClientError::VotingClosed("closed".to_string())));

        assert!(matches!(result, Err(ClientError::VotingClosed(_))));
        assert_eq!(rec.polls(), &before_polls);
        assert_eq!(rec.chat().messages()[0].payload, before_card);
    }

    #[test]
    fn test_successful_vote_takes_server_state() {
        let mut rec = reconciler();
        let pending = rec.begin_vote(9, 2);

        let mut fresh = board();
        fresh.poll.as_mut().unwrap().options = vec![option(2, 3), option(1, 1)];
        fresh.user_vote = Some(UserVote {
            id: 71,
            poll_id: 9,
            poll_option_id: 2,
        });
        if let Some(card) = fresh.chat_messages[0].payload.as_mut() {
            card.options = vec![option(1, 1), option(2, 3)];
            card.user_vote_option_id = Some(2);
        }
        rec.settle(
            pending,
            Ok(VoteConfirmed {
                tally: PollTally {
                    id: 9,
                    options: vec![],
                },
                board: Ok(fresh),
            }),
        )
        .unwrap();

        assert_eq!(rec.polls().user_vote.unwrap().id, 71);
        assert_eq!(counts(&rec.polls().today.as_ref().unwrap().options), vec![3, 1]);
        let card = rec.chat().messages()[0].payload.as_ref().unwrap();
        assert_eq!(counts(&card.options), vec![1, 3]);
        assert_eq!(card.user_vote_option_id, Some(2));
    }

    #[test]
    fn test_failed_reload_keeps_vote_with_returned_tallies() {
        let mut rec = reconciler();
        let pending = rec.begin_vote(9, 2);

        rec.settle(
            pending,
            Ok(VoteConfirmed {
                tally: PollTally {
                    id: 9,
                    options: vec![option(1, 2), option(2, 1)],
                },
                board: Err(ClientError::Rejected {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            }),
        )
        .unwrap();

        assert_eq!(rec.selection(9), Some(2));
        assert_eq!(rec.polls().user_vote.unwrap().poll_option_id, 2);
        assert_eq!(counts(&rec.polls().today.as_ref().unwrap().options), vec![2, 1]);
        let card = rec.chat().messages()[0].payload.as_ref().unwrap();
        assert_eq!(counts(&card.options), vec![2, 1]);
        assert_eq!(card.user_vote_option_id, Some(2));
    }

    #[test]
    fn test_begin_unvote_clears_selection() {
        let mut rec = reconciler();

        let _pending = rec.begin_unvote(9, 1);

        assert_eq!(rec.selection(9), None);
        assert!(rec.polls().user_vote.is_none());
        assert_eq!(counts(&rec.polls().today.as_ref().unwrap().options), vec![1, 0]);
    }

    #[test]
    fn test_own_status_echo_changes_nothing() {
        let mut rec = reconciler();
        let write = StatusWrite {
            iso_week: "2025-W03".parse().unwrap(),
            weekday: 2,
            status: Some(lunchsync_common::LunchStatus::Buying),
            arrival_time: Some("12:15".to_string()),
            location: None,
        };

        rec.apply_local_status(&write);
        let local = rec.statuses().clone();
        rec.apply(&LunchEvent::StatusChanged(write.as_event(1)));

        assert_eq!(rec.statuses(), &local);
    }
}
