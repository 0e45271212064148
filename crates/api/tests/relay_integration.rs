//! Redis relay integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test -p lunchsync-api --test relay_integration -- --ignored`

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use lunchsync_api::{RedisRelay, StreamingState};
use lunchsync_common::EventEnvelope;
use lunchsync_db::test_utils::TestRedisConfig;
use serde_json::json;

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_relay_round_trip_reaches_local_subscribers() {
    let url = TestRedisConfig::default().redis_url();
    let relay = RedisRelay::connect(&url, &TestRedisConfig::unique_prefix()).await.unwrap();
    let streaming = StreamingState::with_relay(relay.clone());
    relay.start(streaming.sender()).await.unwrap();
    let mut rx = streaming.subscribe();

    let envelope = EventEnvelope {
        channel: "week-status.2025-W03".to_string(),
        event: "PollUpdated".to_string(),
        data: json!({"poll": {"id": 1, "options": []}}),
    };
    relay.publish(&envelope).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, envelope);
}
