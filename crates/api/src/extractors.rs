//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use lunchsync_common::AppError;
use lunchsync_db::entities::user;

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Where a form submission returns to, and whether the caller wants JSON
/// instead of a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTo {
    /// Redirect target.
    pub location: String,
    /// `Accept: application/json` was sent.
    pub wants_json: bool,
}

/// Redirect target when the request carries no `Referer`.
pub const DEFAULT_RETURN: &str = "/week-status";

impl ReturnTo {
    /// Derive from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let location = headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_RETURN)
            .to_string();
        let wants_json = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        Self {
            location,
            wants_json,
        }
    }
}

impl<S> FromRequestParts<S> for ReturnTo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
