//! Client Error Types
//!
//! This module defines the error taxonomy for the divination MCP client layer,
//! separating transport failures, JSON-RPC protocol errors, decode failures and
//! session lifecycle errors so that the retry policy can classify them.
//!
//! Application-level tool failures (`result.isError == true` in a provider
//! response) are deliberately NOT part of this enum: they are returned to
//! callers as [`ToolCallResult`](crate::protocol::ToolCallResult) with
//! `success == false`.

use thiserror::Error;

/// The main Error type for the divination MCP client
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (connection, timeout, malformed URL)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP responses and other wire-level failures.
    ///
    /// `status` is kept structured so the retry policy can test for
    /// 5xx / 429 without re-parsing the message.
    #[error("transport error: {message}")]
    Transport {
        /// HTTP status code, when the failure carried one
        status: Option<u16>,
        /// Human-readable description including the response body
        message: String,
    },

    /// The provider returned a JSON-RPC envelope with the `error` field set
    #[error("provider returned JSON-RPC error: {0}")]
    Protocol(String),

    /// The response envelope was malformed or missing required fields
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The streamed response closed before any frame arrived
    #[error("stream closed before any frame arrived")]
    EmptyStream,

    /// The provider signalled (heuristically) that the session expired.
    ///
    /// Produced only by [`signals_session_expiry`](crate::session::signals_session_expiry);
    /// retried by the session predicate after the session has been invalidated.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The session handshake failed and the session was reset to `Absent`
    #[error("session initialization failed: {message}")]
    SessionInitFailed {
        /// Description of the handshake failure
        message: String,
        /// The underlying failure, when one exists
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A follower waited out its budget for another caller's handshake
    #[error("timed out waiting for session initialization")]
    SessionWaitTimeout,

    /// The retry policy exhausted its attempt budget
    #[error("{operation} still failing after {attempts} attempts")]
    RetryExhausted {
        /// Name of the retried operation
        operation: String,
        /// Total attempts made before giving up
        attempts: u32,
        /// The last failure observed
        #[source]
        cause: Box<Error>,
    },

    /// Missing or invalid provider configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a transport error carrying the HTTP status when available
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Transport {
            status,
            message: message.into(),
        }
    }

    /// Wrap a handshake failure, preserving the original cause
    pub fn session_init_failed(cause: Error) -> Self {
        Error::SessionInitFailed {
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }
}
