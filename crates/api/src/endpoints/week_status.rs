//! Week status endpoints: the board, status cells and the week chat.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use lunchsync_common::{AppResult, ChatMessageView, DayStatusRow, WeekBoard};
use lunchsync_core::week_status::status_row;
use serde::Serialize;

use crate::{
    endpoints::forms::{ChatForm, ClearStatusForm, StatusForm, WeekQuery},
    extractors::{AuthUser, ReturnTo},
    middleware::AppState,
    response::Back,
};

/// Result of clearing a cell.
#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    /// Whether a stored row was removed.
    pub deleted: bool,
}

/// Week board snapshot.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> AppResult<Json<WeekBoard>> {
    let board = state
        .week_board_service
        .board(user.id, query.week()?)
        .await?;
    Ok(Json(board))
}

/// Create or overwrite the caller's cell.
async fn upsert(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<StatusForm>,
) -> AppResult<Back<DayStatusRow>> {
    let input = form.into_input()?;
    let saved = state.week_status_service.upsert(user.id, input).await?;
    Ok(Back::new(back, status_row(&saved)))
}

/// Delete the caller's cell.
async fn destroy(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<ClearStatusForm>,
) -> AppResult<Back<ClearedResponse>> {
    let (iso_week, weekday) = form.into_key()?;
    let deleted = state
        .week_status_service
        .destroy(user.id, &iso_week, weekday)
        .await?;
    Ok(Back::new(back, ClearedResponse { deleted }))
}

/// Post a chat message.
async fn chat(
    AuthUser(user): AuthUser,
    back: ReturnTo,
    State(state): State<AppState>,
    Json(form): Json<ChatForm>,
) -> AppResult<Back<ChatMessageView>> {
    let (iso_week, body) = form.into_parts()?;
    let message = state.chat_service.post(&user, iso_week, &body).await?;
    Ok(Back::new(back, message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(upsert).delete(destroy))
        .route("/chat", post(chat))
}
