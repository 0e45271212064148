//! API response types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::extractors::ReturnTo;

/// Outcome of a successful form submission.
///
/// Browsers get `303 See Other` back to the page they came from; JSON
/// callers get the payload directly.
#[derive(Debug)]
pub struct Back<T: Serialize> {
    target: ReturnTo,
    data: T,
}

impl<T: Serialize> Back<T> {
    /// Respond to `target` with `data`.
    pub const fn new(target: ReturnTo, data: T) -> Self {
        Self { target, data }
    }
}

impl<T: Serialize> IntoResponse for Back<T> {
    fn into_response(self) -> Response {
        if self.target.wants_json {
            return (StatusCode::OK, Json(self.data)).into_response();
        }

        let location = HeaderValue::from_str(&self.target.location)
            .unwrap_or_else(|_| HeaderValue::from_static(crate::extractors::DEFAULT_RETURN));
        (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
    }
}
