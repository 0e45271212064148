//! Client-side error type.

use std::collections::BTreeMap;

use lunchsync_common::ProtocolError;

/// Errors surfaced by the reconciler and its gateway.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server refused one or more fields.
    #[error("Invalid input: {}", summarize(.0))]
    InvalidFields(BTreeMap<String, String>),

    /// Voting is closed for the poll.
    #[error("{0}")]
    VotingClosed(String),

    /// Bearer token missing or not accepted.
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-success response.
    #[error("Request failed: {status} - {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, if any.
        message: String,
    },

    /// Push event could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A local composer or editor refused the input before sending.
    #[error("{0}")]
    Refused(&'static str),

    /// Preference store I/O.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
