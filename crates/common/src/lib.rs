//! Common utilities and shared types for lunchsync.
//!
//! This crate provides foundational components used across all lunchsync crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ISO weeks**: Week keys and broadcast channel names via [`IsoWeek`]
//! - **Clocks**: Injectable time sources via [`Clock`] and [`LocalClock`]
//! - **Snapshots**: First-load page payloads via [`WeekBoard`] and [`PollPage`]
//! - **Protocol**: Push-channel events via [`LunchEvent`] and [`EventEnvelope`]
//!
//! # Example
//!
//! ```no_run
//! use lunchsync_common::{AppResult, Config, LocalClock};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let clock = LocalClock::system(config.lunch.tz()?);
//!     println!("Today is {}", clock.today());
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod week;

pub use board::{BoardUser, DayStatusRow, PollPage, PollView, UserVote, WeekBoard};
pub use clock::{Clock, LocalClock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult, FieldErrors};
pub use protocol::{
    ChatAuthor, ChatMessageView, EventEnvelope, LunchEvent, LunchStatus, MessageKind, PollCard,
    PollOptionTally, PollTally, ProtocolError, StatusChanged,
};
pub use week::{CHANNEL_PREFIX, ISO_WEEK_PATTERN, IsoWeek};
