//! API middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use lunchsync_core::{ChatService, PollService, WeekBoardService, WeekStatusService};
use lunchsync_db::repositories::UserRepository;

use crate::streaming::StreamingState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Token lookup for the auth middleware.
    pub user_repo: UserRepository,
    /// Status Store.
    pub week_status_service: WeekStatusService,
    /// Chat Log.
    pub chat_service: ChatService,
    /// Poll Engine.
    pub poll_service: PollService,
    /// Page snapshot assembly.
    pub week_board_service: WeekBoardService,
    /// Push channel hub.
    pub streaming: StreamingState,
}

/// Bearer token carried by a request, if any.
pub fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` to a user and stores it in the
/// request extensions. Anonymous requests pass through; handlers that need
/// a user reject them via [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req).map(ToString::to_string) {
        match state.user_repo.find_by_token(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => tracing::debug!("Unknown bearer token"),
            Err(e) => tracing::warn!(error = %e, "Token lookup failed"),
        }
    }

    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request_with(value: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&request_with("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&request_with("Basic abc123")), None);
        assert_eq!(bearer_token(&request_with("Bearer   ")), None);
        assert_eq!(bearer_token(&Request::new(Body::empty())), None);
    }
}
