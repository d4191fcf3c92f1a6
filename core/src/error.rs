//! Error types for the poll API client.
//!
//! # Design
//! `AuthRequired` is raised locally, before any request exists, and never
//! wraps a network failure. Every non-2xx response lands in `Http` with the
//! raw status code and body. Transport failures keep the underlying error as
//! their source instead of being translated.

/// Errors returned by `PollyClient`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An authenticated operation was called with no token set.
    #[error("authentication token is required, login first")]
    AuthRequired,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The transport could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl ApiError {
    /// HTTP status of an `Http` error, `None` for every other kind.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
