//! Database entities.

#![allow(missing_docs)]

pub mod chat_message;
pub mod day_status;
pub mod poll;
pub mod poll_option;
pub mod user;
pub mod vote;

pub use chat_message::Entity as ChatMessage;
pub use day_status::Entity as DayStatus;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use user::Entity as User;
pub use vote::Entity as Vote;
