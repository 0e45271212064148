//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time events.
//! The actual fan-out is provided by the api crate (in-process hub,
//! optionally relayed through Redis Pub/Sub).

use async_trait::async_trait;
use lunchsync_common::{AppResult, LunchEvent};
use std::sync::{Arc, Mutex};

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without directly depending on the transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on its week channel.
    async fn publish(&self, event: &LunchEvent) -> AppResult<()>;
}

/// A no-op implementation of EventPublisher for testing or when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: &LunchEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Publisher that keeps every event in memory.
#[derive(Clone, Default)]
pub struct RecordingEventPublisher {
    events: Arc<Mutex<Vec<LunchEvent>>>,
}

impl RecordingEventPublisher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<LunchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &LunchEvent) -> AppResult<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}

/// Wrapper for boxed EventPublisher trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// Publish `event` if a publisher is configured.
///
/// Delivery is best effort: failures are logged and never reach the caller.
pub(crate) async fn publish_best_effort(
    publisher: Option<&EventPublisherService>,
    event: LunchEvent,
) {
    if let Some(publisher) = publisher
        && let Err(e) = publisher.publish(&event).await
    {
        tracing::warn!(
            error = %e,
            event = event.name(),
            channel = %event.channel(),
            "Failed to publish event"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lunchsync_common::{AppError, StatusChanged};

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &LunchEvent) -> AppResult<()> {
            Err(AppError::Redis("connection refused".to_string()))
        }
    }

    fn cleared() -> LunchEvent {
        LunchEvent::StatusChanged(StatusChanged::cleared("2025-W03".parse().unwrap(), 1, 2))
    }

    #[tokio::test]
    async fn test_recording_publisher_keeps_order() {
        let recorder = RecordingEventPublisher::new();
        let service: EventPublisherService = Arc::new(recorder.clone());

        publish_best_effort(Some(&service), cleared()).await;
        publish_best_effort(Some(&service), cleared()).await;

        assert_eq!(recorder.events().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let service: EventPublisherService = Arc::new(FailingPublisher);
        publish_best_effort(Some(&service), cleared()).await;
        publish_best_effort(None, cleared()).await;
    }
}
