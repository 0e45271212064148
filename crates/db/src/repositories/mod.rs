//! Repository layer for database access.

mod chat_message;
mod day_status;
mod poll;
mod user;

pub use chat_message::{ChatMessageRepository, MessageWithAuthor};
pub use day_status::DayStatusRepository;
pub use poll::{OptionOrder, PollRepository, VoteChange, VoteOutcome, plan_vote};
pub use user::UserRepository;
