//! Error types for kambot.
//!
//! [`KambotError`] is what every external collaborator (moderation,
//! classification, retrieval, generation, verification, audit) reports when
//! it cannot produce an answer. It is non-exhaustive to allow future
//! extension without breaking downstream.

use thiserror::Error;

/// Top-level error type for kambot collaborators and configuration.
///
/// Variants are grouped into collaborator failures (the pipeline maps these
/// to a `SystemError` outcome) and fatal local failures (config, I/O).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KambotError {
    // ── Collaborator ─────────────────────────────────────────────────

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Human-readable name of the operation that timed out.
        operation: String,
    },

    /// The request never reached the service, or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// A provider returned an error (bad request, auth, quota, server error).
    #[error("provider error: {message}")]
    Provider {
        /// Provider-supplied error message.
        message: String,
    },

    /// The service answered, but the answer could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The service is not configured or temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    // ── Fatal ────────────────────────────────────────────────────────

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KambotError {
    /// Build a [`KambotError::Timeout`] for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KambotError>;
