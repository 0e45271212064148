//! Client-side reconciliation for lunchsync.
//!
//! This crate keeps a local copy of one week board in step with the server:
//!
//! - **Mirrors**: status, chat and poll state with a merge function per event
//! - **Reconciler**: channel plan, event routing, optimistic votes
//! - **Editor**: debounced location writes, day clipboard, coming-days batch
//! - **Composers**: chat and poll forms
//! - **Gateway**: the HTTP calls, behind a trait for tests
//! - **Preferences**: durable user settings
//!
//! # Example
//!
//! ```no_run
//! use lunchsync_client::{ClientResult, Gateway, HttpGateway, Reconciler};
//!
//! async fn example() -> ClientResult<()> {
//!     let gateway = HttpGateway::new("http://localhost:3000", "token")?;
//!     let board = gateway.board(None).await?;
//!     let today = chrono::Local::now().date_naive();
//!     let reconciler = Reconciler::from_board(board, today);
//!     println!("Listening on {:?}", reconciler.channels().channels());
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod composer;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod mirror;
pub mod preferences;
pub mod reconciler;

pub use composer::{ChatComposer, PollComposer};
pub use debounce::DebounceTable;
pub use editor::{
    COMING_DAYS_STAGGER, ClearRequest, ComingDaysPlan, CopiedDay, DEFAULT_LOCATIONS,
    LOCATION_DEBOUNCE, StatusWrite, WeekEditor,
};
pub use error::{ClientError, ClientResult};
pub use gateway::{CreatedPoll, Gateway, HttpGateway};
pub use mirror::{ChatMirror, PollMirror, StatusMirror};
pub use preferences::{JsonFileStore, MemoryStore, PreferenceStore};
pub use reconciler::{
    Applied, ChannelPlan, ComingDaysReport, PendingVote, Reconciler, VoteConfirmed,
};
