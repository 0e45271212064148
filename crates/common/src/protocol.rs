//! Push-channel wire types.
//!
//! Every event travels on `week-status.{isoWeek}` as an [`EventEnvelope`]:
//! the event name plus a JSON payload whose field names are fixed by the
//! browser clients already listening for them.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::week::{IsoWeek, week_from_channel};

/// Wire name of the status change event.
pub const STATUS_CHANGED: &str = "WeekStatusUpdated";
/// Wire name of the chat message event.
pub const CHAT_MESSAGE_POSTED: &str = "ChatMessagePosted";
/// Wire name of the poll tally event.
pub const POLL_UPDATED: &str = "PollUpdated";

/// What a user does for lunch on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LunchStatus {
    /// Brings food from home.
    Lunchbox,
    /// Buys lunch out.
    Buying,
    /// Stays home.
    Home,
}

impl LunchStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 3] = [Self::Lunchbox, Self::Buying, Self::Home];

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lunchbox => "Lunchbox",
            Self::Buying => "Buying",
            Self::Home => "Home",
        }
    }
}

impl std::str::FromStr for LunchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown lunch status {s:?}"))
    }
}

/// Full state of one `(user, weekday)` cell after a mutation.
///
/// All three value fields `None` means the cell was cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    /// Week the cell belongs to.
    pub iso_week: IsoWeek,
    /// Owner of the cell.
    pub user_id: i64,
    /// 1 (Monday) to 5 (Friday).
    pub weekday: u8,
    /// Lunch plan.
    pub status: Option<LunchStatus>,
    /// `HH:MM`.
    pub arrival_time: Option<String>,
    /// Free-text place.
    pub location: Option<String>,
}

impl StatusChanged {
    /// Event announcing a deleted cell.
    #[must_use]
    pub const fn cleared(iso_week: IsoWeek, user_id: i64, weekday: u8) -> Self {
        Self {
            iso_week,
            user_id,
            weekday,
            status: None,
            arrival_time: None,
            location: None,
        }
    }

    /// Whether this event clears the cell.
    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        self.status.is_none() && self.arrival_time.is_none() && self.location.is_none()
    }
}

/// Public view of a message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    /// User id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Avatar URL or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Chat message kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
    /// Embedded poll.
    Poll,
}

impl MessageKind {
    /// Whether this is a plain text message.
    #[must_use]
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// One option with its current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionTally {
    /// Option id.
    pub id: i64,
    /// Option name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Votes cast for this option.
    pub vote_count: i32,
}

/// Poll snapshot embedded in a poll-type chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCard {
    /// Referenced poll.
    pub poll_id: i64,
    /// Optional poll title.
    #[serde(default)]
    pub title: Option<String>,
    /// Options in creation order.
    pub options: Vec<PollOptionTally>,
    /// The viewer's current choice.
    #[serde(default)]
    pub user_vote_option_id: Option<i64>,
}

/// A chat message as delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageView {
    /// Message id.
    pub id: i64,
    /// Message kind. Omitted on the wire for text, the default.
    #[serde(rename = "type", default, skip_serializing_if = "MessageKind::is_text")]
    pub kind: MessageKind,
    /// Text body (text messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Poll snapshot (poll messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PollCard>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Author.
    pub user: ChatAuthor,
}

/// Current tallies of one poll, options in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTally {
    /// Poll id.
    pub id: i64,
    /// Options in creation order.
    pub options: Vec<PollOptionTally>,
}

#[derive(Serialize, Deserialize)]
struct PollUpdatedData {
    poll: PollTally,
}

/// A domain event, addressed to its week channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LunchEvent {
    /// A status cell was written or cleared.
    StatusChanged(StatusChanged),
    /// A chat message was created.
    ChatMessagePosted {
        /// Week the message was posted to.
        iso_week: IsoWeek,
        /// The message.
        message: ChatMessageView,
    },
    /// Poll tallies changed.
    PollUpdated {
        /// Week of the poll's date.
        iso_week: IsoWeek,
        /// Tallies in creation order.
        poll: PollTally,
    },
}

/// Serialized event as it crosses a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// `week-status.{isoWeek}`.
    pub channel: String,
    /// Wire event name.
    pub event: String,
    /// Event payload.
    pub data: Value,
}

/// Failure to decode an [`EventEnvelope`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Event name not recognized.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    /// Channel is not a week channel.
    #[error("Not a week channel: {0}")]
    BadChannel(String),
    /// Payload does not match the event's shape.
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl LunchEvent {
    /// Wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => STATUS_CHANGED,
            Self::ChatMessagePosted { .. } => CHAT_MESSAGE_POSTED,
            Self::PollUpdated { .. } => POLL_UPDATED,
        }
    }

    /// Week whose channel carries this event.
    #[must_use]
    pub const fn iso_week(&self) -> &IsoWeek {
        match self {
            Self::StatusChanged(e) => &e.iso_week,
            Self::ChatMessagePosted { iso_week, .. } | Self::PollUpdated { iso_week, .. } => {
                iso_week
            }
        }
    }

    /// Channel name.
    #[must_use]
    pub fn channel(&self) -> String {
        self.iso_week().channel()
    }

    /// JSON payload.
    pub fn data(&self) -> serde_json::Result<Value> {
        match self {
            Self::StatusChanged(e) => serde_json::to_value(e),
            Self::ChatMessagePosted { message, .. } => serde_json::to_value(message),
            Self::PollUpdated { poll, .. } => serde_json::to_value(PollUpdatedData {
                poll: poll.clone(),
            }),
        }
    }

    /// Wrap for transport.
    pub fn to_envelope(&self) -> serde_json::Result<EventEnvelope> {
        Ok(EventEnvelope {
            channel: self.channel(),
            event: self.name().to_string(),
            data: self.data()?,
        })
    }

    /// Decode a received envelope.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, ProtocolError> {
        let iso_week = week_from_channel(&envelope.channel)
            .ok_or_else(|| ProtocolError::BadChannel(envelope.channel.clone()))?;

        match envelope.event.as_str() {
            STATUS_CHANGED => Ok(Self::StatusChanged(serde_json::from_value(
                envelope.data.clone(),
            )?)),
            CHAT_MESSAGE_POSTED => Ok(Self::ChatMessagePosted {
                iso_week,
                message: serde_json::from_value(envelope.data.clone())?,
            }),
            POLL_UPDATED => {
                let data: PollUpdatedData = serde_json::from_value(envelope.data.clone())?;
                Ok(Self::PollUpdated {
                    iso_week,
                    poll: data.poll,
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn week() -> IsoWeek {
        "2025-W03".parse().unwrap()
    }

    #[test]
    fn test_status_changed_wire_shape() {
        let event = LunchEvent::StatusChanged(StatusChanged {
            iso_week: week(),
            user_id: 4,
            weekday: 2,
            status: Some(LunchStatus::Buying),
            arrival_time: Some("11:30".to_string()),
            location: None,
        });

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.channel, "week-status.2025-W03");
        assert_eq!(envelope.event, "WeekStatusUpdated");
        assert_eq!(
            envelope.data,
            json!({
                "isoWeek": "2025-W03",
                "userId": 4,
                "weekday": 2,
                "status": "Buying",
                "arrivalTime": "11:30",
                "location": null
            })
        );
    }

    #[test]
    fn test_cleared_status() {
        let cleared = StatusChanged::cleared(week(), 1, 5);
        assert!(cleared.is_cleared());

        let mut set = cleared;
        set.location = Some("Bulten".to_string());
        assert!(!set.is_cleared());
    }

    #[test]
    fn test_poll_updated_wire_shape() {
        let event = LunchEvent::PollUpdated {
            iso_week: week(),
            poll: PollTally {
                id: 9,
                options: vec![PollOptionTally {
                    id: 1,
                    name: "Pizza Palace".to_string(),
                    description: None,
                    vote_count: 2,
                }],
            },
        };

        let data = event.data().unwrap();
        assert_eq!(
            data,
            json!({"poll": {"id": 9, "options": [
                {"id": 1, "name": "Pizza Palace", "description": null, "vote_count": 2}
            ]}})
        );
    }

    #[test]
    fn test_text_message_is_minimal_payload() {
        let message = ChatMessageView {
            id: 3,
            kind: MessageKind::Text,
            body: Some("hi".to_string()),
            payload: None,
            created_at: DateTime::parse_from_rfc3339("2025-01-15T10:00:00+01:00").unwrap(),
            user: ChatAuthor {
                id: 1,
                name: "Alice".to_string(),
                avatar: None,
            },
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "body": "hi",
                "created_at": "2025-01-15T10:00:00+01:00",
                "user": {"id": 1, "name": "Alice"}
            })
        );

        let back: ChatMessageView = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind, MessageKind::Text);
    }

    #[test]
    fn test_from_envelope_reads_back_poll_message() {
        let envelope = EventEnvelope {
            channel: "week-status.2025-W03".to_string(),
            event: "ChatMessagePosted".to_string(),
            data: json!({
                "id": 7,
                "type": "poll",
                "payload": {"poll_id": 2, "title": "Friday?", "options": []},
                "created_at": "2025-01-15T10:00:00+01:00",
                "user": {"id": 1, "name": "Alice"}
            }),
        };

        let LunchEvent::ChatMessagePosted { iso_week, message } =
            LunchEvent::from_envelope(&envelope).unwrap()
        else {
            panic!("expected a chat event");
        };
        assert_eq!(iso_week, week());
        assert_eq!(message.kind, MessageKind::Poll);
        assert_eq!(message.payload.unwrap().user_vote_option_id, None);
    }

    #[test]
    fn test_from_envelope_rejects_unknown_event_and_channel() {
        let mut envelope = EventEnvelope {
            channel: "week-status.2025-W03".to_string(),
            event: "Something".to_string(),
            data: json!({}),
        };
        assert!(matches!(
            LunchEvent::from_envelope(&envelope),
            Err(ProtocolError::UnknownEvent(_))
        ));

        envelope.channel = "private-user.1".to_string();
        assert!(matches!(
            LunchEvent::from_envelope(&envelope),
            Err(ProtocolError::BadChannel(_))
        ));
    }
}
