//! Server-Sent Events (SSE) for real-time updates.
//!
//! `GET /streaming/sse/{iso_week}` streams one week channel. Each frame's
//! `event:` is the wire event name and `data:` its JSON payload.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use lunchsync_common::{AppError, AppResult, EventEnvelope, IsoWeek};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::middleware::AppState;

/// Seconds between keep-alive comments.
pub const KEEP_ALIVE_SECS: u64 = 30;

/// SSE frame for an envelope.
#[must_use]
pub fn sse_event(envelope: &EventEnvelope) -> Event {
    Event::default()
        .event(&envelope.event)
        .data(envelope.data.to_string())
}

/// One week channel as an SSE stream.
async fn week_stream(
    Path(iso_week): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let week: IsoWeek = iso_week
        .parse()
        .map_err(|_| AppError::field("iso_week", "The iso week field format is invalid."))?;
    let channel = week.channel();

    tracing::info!(channel = %channel, "SSE stream opened");

    let rx = state.streaming.subscribe();
    let wanted = channel.clone();
    // Lagged receivers skip what they missed
    let events = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(envelope) if envelope.channel == wanted => Some(Ok(sse_event(&envelope))),
        _ => None,
    });

    let initial = stream::once(async move { Ok(Event::default().event("connected").data(channel)) });

    Ok(Sse::new(initial.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    ))
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{iso_week}", get(week_stream))
}
