//! WebSocket streaming API.
//!
//! One public channel per ISO week (`week-status.{isoWeek}`). A socket
//! subscribes to any number of week channels and receives every event
//! published on them while connected. There is no replay: a socket that is
//! not connected when an event is published never sees it.

use std::collections::HashSet;

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use lunchsync_common::{AppError, AppResult, EventEnvelope, LunchEvent, week::week_from_channel};
use lunchsync_core::EventPublisher;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::middleware::AppState;
use crate::relay::RedisRelay;

/// Buffered events per subscriber before it starts lagging.
const HUB_CAPACITY: usize = 1000;

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Start receiving a week channel.
    Subscribe { channel: String },
    /// Stop receiving a week channel.
    Unsubscribe { channel: String },
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Subscription accepted.
    Subscribed { channel: String },
    /// Subscription dropped.
    Unsubscribed { channel: String },
    /// An event on a subscribed channel.
    Event(EventEnvelope),
    /// The client message was rejected.
    Error { message: String },
}

/// Shared state for streaming.
#[derive(Clone)]
pub struct StreamingState {
    tx: broadcast::Sender<EventEnvelope>,
    relay: Option<RedisRelay>,
}

impl StreamingState {
    /// Create an in-process hub.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx, relay: None }
    }

    /// Create a hub whose events travel through Redis.
    ///
    /// The relay must be started with [`Self::sender`] so that relayed
    /// events, including this instance's own, reach local subscribers.
    #[must_use]
    pub fn with_relay(relay: RedisRelay) -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self {
            tx,
            relay: Some(relay),
        }
    }

    /// Sender feeding local subscribers.
    #[must_use]
    pub fn sender(&self) -> broadcast::Sender<EventEnvelope> {
        self.tx.clone()
    }

    /// Receive every event delivered to this instance.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Deliver to local subscribers. Returns how many received it.
    pub fn publish_local(&self, envelope: EventEnvelope) -> usize {
        self.tx.send(envelope).unwrap_or(0)
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for StreamingState {
    async fn publish(&self, event: &LunchEvent) -> AppResult<()> {
        let envelope = event
            .to_envelope()
            .map_err(|e| AppError::Internal(format!("Failed to encode event: {e}")))?;

        if let Some(relay) = &self.relay {
            if let Err(e) = relay.publish(&envelope).await {
                // Local subscribers still get it
                self.publish_local(envelope);
                return Err(AppError::Redis(e.to_string()));
            }
            return Ok(());
        }

        let receivers = self.publish_local(envelope);
        debug!(event = event.name(), channel = %event.channel(), receivers, "Event published");
        Ok(())
    }
}

/// Apply a client message to a socket's subscription set.
pub fn apply_client_message(
    msg: ClientMessage,
    subscriptions: &mut HashSet<String>,
) -> ServerMessage {
    match msg {
        ClientMessage::Subscribe { channel } => {
            if week_from_channel(&channel).is_none() {
                warn!(channel = %channel, "Rejected subscription to unknown channel");
                return ServerMessage::Error {
                    message: format!("Unknown channel: {channel}"),
                };
            }
            subscriptions.insert(channel.clone());
            info!(channel = %channel, "Channel subscribed");
            ServerMessage::Subscribed { channel }
        }
        ClientMessage::Unsubscribe { channel } => {
            subscriptions.remove(&channel);
            info!(channel = %channel, "Channel unsubscribed");
            ServerMessage::Unsubscribed { channel }
        }
    }
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("New streaming connection");

    ws.on_upgrade(move |socket| handle_socket(socket, state.streaming))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, streaming: StreamingState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = streaming.subscribe();
    let mut subscriptions: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => apply_client_message(client_msg, &mut subscriptions),
                            Err(e) => {
                                warn!(error = %e, "Failed to parse client message");
                                ServerMessage::Error { message: e.to_string() }
                            }
                        };
                        let json = serde_json::to_string(&reply).unwrap_or_default();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Client closed connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(envelope) => {
                        if !subscriptions.contains(&envelope.channel) {
                            continue;
                        }
                        let json = serde_json::to_string(&ServerMessage::Event(envelope))
                            .unwrap_or_default();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Streaming connection lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(channels = subscriptions.len(), "Streaming connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lunchsync_common::{PollTally, StatusChanged};

    fn status_event() -> LunchEvent {
        LunchEvent::StatusChanged(StatusChanged::cleared("2025-W03".parse().unwrap(), 1, 2))
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","body":{"channel":"week-status.2025-W03"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { ref channel } if channel == "week-status.2025-W03"));
    }

    #[test]
    fn test_only_week_channels_can_be_subscribed() {
        let mut subs = HashSet::new();

        let reply = apply_client_message(
            ClientMessage::Subscribe {
                channel: "private-user.1".to_string(),
            },
            &mut subs,
        );
        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert!(subs.is_empty());

        let reply = apply_client_message(
            ClientMessage::Subscribe {
                channel: "week-status.2025-W03".to_string(),
            },
            &mut subs,
        );
        assert!(matches!(reply, ServerMessage::Subscribed { .. }));
        assert!(subs.contains("week-status.2025-W03"));

        apply_client_message(
            ClientMessage::Unsubscribe {
                channel: "week-status.2025-W03".to_string(),
            },
            &mut subs,
        );
        assert!(subs.is_empty());
    }

    #[test]
    fn test_event_message_shape() {
        let envelope = status_event().to_envelope().unwrap();
        let json = serde_json::to_value(ServerMessage::Event(envelope)).unwrap();

        assert_eq!(json["type"], "event");
        assert_eq!(json["body"]["channel"], "week-status.2025-W03");
        assert_eq!(json["body"]["event"], "WeekStatusUpdated");
        assert_eq!(json["body"]["data"]["weekday"], 2);
    }

    #[tokio::test]
    async fn test_publish_reaches_local_subscribers() {
        let hub = StreamingState::new();
        let mut rx = hub.subscribe();

        hub.publish(&LunchEvent::PollUpdated {
            iso_week: "2025-W03".parse().unwrap(),
            poll: PollTally {
                id: 4,
                options: Vec::new(),
            },
        })
        .await
        .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event, "PollUpdated");
        assert_eq!(envelope.data["poll"]["id"], 4);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = StreamingState::new();
        assert!(hub.publish(&status_event()).await.is_ok());
    }
}
