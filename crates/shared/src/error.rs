//! Error types shared across the client.

use thiserror::Error;

/// Errors surfaced by the REST API boundary.
///
/// The server wraps responses in a `{success, data, error}` envelope; on this
/// side the envelope is rendered as a `Result`, with failures carrying the
/// server's message when one was present.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never reached the server or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not valid JSON.
    #[error("server returned a response that was not valid JSON")]
    InvalidResponseFormat,

    /// No API base URL was configured.
    #[error("API base URL is not configured")]
    MissingBaseUrl,
}

impl ApiError {
    /// The user-facing message: the server's own words when present,
    /// otherwise a generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Errors surfaced by the realtime connection layer.
///
/// Transport-level failures (connect errors, drops, exhausted retries) are
/// recorded into the observable connection state rather than returned, so
/// this enum only covers conditions the caller must act on directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No stored credential token; the user must log in before connecting.
    #[error("no stored credential token")]
    AuthenticationMissing,

    /// A send was attempted without a live session. Writes fail fast when
    /// disconnected; there is no offline queue.
    #[error("not connected")]
    NotConnected,
}
