//! HTTP API layer for lunchsync.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: week board, status cells, chat, polls
//! - **Extractors**: authentication, redirect-back targets
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: WebSocket and Server-Sent Events per ISO-week channel,
//!   optionally relayed across instances through Redis
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod relay;
pub mod response;
pub mod sse;
pub mod streaming;

pub use endpoints::router;
pub use middleware::AppState;
pub use relay::RedisRelay;
pub use streaming::{StreamingState, streaming_handler};
