//! Redis Pub/Sub relay for cross-instance event distribution.
//!
//! Every instance publishes its events to Redis and re-broadcasts whatever
//! arrives on the week channels to its own WebSocket and SSE subscribers.
//! Delivery stays fire-and-forget: nothing is buffered or replayed.

use fred::clients::{Client, SubscriberClient};
use fred::error::{Error as RedisError, ErrorKind as RedisErrorKind};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use lunchsync_common::{CHANNEL_PREFIX, EventEnvelope};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Redis channel for a week channel under `prefix`.
#[must_use]
pub fn redis_channel(prefix: &str, channel: &str) -> String {
    format!("{prefix}:{channel}")
}

/// Pattern matching every week channel under `prefix`.
#[must_use]
pub fn redis_pattern(prefix: &str) -> String {
    format!("{prefix}:{CHANNEL_PREFIX}*")
}

/// Redis Pub/Sub connection pair.
#[derive(Clone)]
pub struct RedisRelay {
    publisher: Client,
    subscriber: SubscriberClient,
    prefix: String,
}

impl RedisRelay {
    /// Connect both clients.
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!(prefix, "Redis relay connected");

        Ok(Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
        })
    }

    /// Subscribe to all week channels and forward them into `local_tx`.
    pub async fn start(&self, local_tx: broadcast::Sender<EventEnvelope>) -> Result<(), RedisError> {
        let pattern = redis_pattern(&self.prefix);
        self.subscriber.psubscribe(pattern.clone()).await?;
        info!(pattern = %pattern, "Subscribed to Redis week channels");

        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let Some(payload) = message.value.as_string() else {
                    continue;
                };
                match serde_json::from_str::<EventEnvelope>(&payload) {
                    Ok(envelope) => {
                        debug!(channel = %envelope.channel, event = %envelope.event, "Relayed event");
                        // No local subscribers is normal
                        let _ = local_tx.send(envelope);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse relayed event");
                    }
                }
            }
            info!("Redis relay stream ended");
        });

        Ok(())
    }

    /// Publish an envelope on its week channel.
    pub async fn publish(&self, envelope: &EventEnvelope) -> Result<(), RedisError> {
        let payload = serde_json::to_string(envelope).map_err(|e| {
            RedisError::new(
                RedisErrorKind::InvalidArgument,
                format!("Serialization error: {e}"),
            )
        })?;
        let channel = redis_channel(&self.prefix, &envelope.channel);
        let _: () = self.publisher.publish(channel.as_str(), payload).await?;
        debug!(channel = %channel, event = %envelope.event, "Published event to Redis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(
            redis_channel("lunchsync", "week-status.2025-W03"),
            "lunchsync:week-status.2025-W03"
        );
        assert_eq!(redis_pattern("lunchsync"), "lunchsync:week-status.*");
    }
}
