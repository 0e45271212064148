//! Core business logic for lunchsync.
//!
//! The Status Store, Poll Engine and Chat Log services own every write and
//! hand the resulting [`lunchsync_common::LunchEvent`]s to an
//! [`EventPublisher`] once the write is durable.

pub mod services;

pub use services::*;
