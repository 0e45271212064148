//! Poll endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use lunchsync_common::{AppResult, ChatMessageView, PollPage, PollTally};
use serde::Serialize;

use crate::{
    endpoints::forms::{CreatePollForm, VoteForm},
    extractors::{AuthUser, ReturnTo},
    middleware::AppState,
    response::Back,
};

/// Poll created from the chat.
#[derive(Debug, Serialize)]
pub struct CreatedPollResponse {
    /// Tallies in creation order.
    pub poll: PollTally,
    /// The chat message announcing it.
    pub message: ChatMessageView,
}

/// Dedicated poll page; creates today's poll on first visit.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<PollPage>> {
    Ok(Json(state.poll_service.page(user.id).await?))
}

/// Vote on an option.
async fn vote(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<VoteForm>,
) -> AppResult<Back<PollTally>> {
    let tally = state
        .poll_service
        .vote(user.id, form.poll_option_id)
        .await?;
    Ok(Back::new(back, tally))
}

/// Withdraw a vote.
async fn unvote(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<VoteForm>,
) -> AppResult<Back<PollTally>> {
    let tally = state
        .poll_service
        .unvote(user.id, form.poll_option_id)
        .await?;
    Ok(Back::new(back, tally))
}

/// Start a poll from the chat.
async fn store_from_chat(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<CreatePollForm>,
) -> AppResult<Back<CreatedPollResponse>> {
    let (title, options) = form.into_parts()?;
    let (poll, message) = state
        .poll_service
        .create_from_chat(&user, title.as_deref(), &options)
        .await?;
    Ok(Back::new(back, CreatedPollResponse { poll, message }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show))
        .route("/vote", post(vote))
        .route("/unvote", post(unvote))
        .route("/store-from-chat", post(store_from_chat))
}
