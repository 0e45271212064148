//! Business logic services.

pub mod chat;
pub mod event_publisher;
pub mod poll;
pub mod week_board;
pub mod week_status;

pub use chat::{ChatService, ChatSettings, MAX_BODY_CHARS};
pub use event_publisher::{
    EventPublisher, EventPublisherService, NoOpEventPublisher, RecordingEventPublisher,
};
pub use poll::{
    DEFAULT_OPTIONS, MAX_OPTION_CHARS, MAX_TITLE_CHARS, PollService, PollSettings, PollStatus,
};
pub use week_board::WeekBoardService;
pub use week_status::{MAX_LOCATION_CHARS, StatusInput, WeekStatusService};
