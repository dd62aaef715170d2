//! Failures of a single chat completion call.
//!
//! [`ProviderError`] keeps the HTTP-level detail the client sees. The
//! pipeline never matches on it directly: every variant folds into a
//! [`KambotError`] through the `From` impl at the bottom of this file.

use kambot_types::KambotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Non-2xx answer that is not covered by a more specific variant.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// 401 or 403.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// 429 that is not a quota problem.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// No API key in the environment and none supplied explicitly.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// 2xx body that is not a usable completion.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// `finish_reason == "content_filter"` on the first choice.
    #[error("completion withheld by provider content filter")]
    ContentFiltered,

    #[error("timeout")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

const OPERATION: &str = "llm completion";

impl From<ProviderError> for KambotError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout => KambotError::timeout(OPERATION),
            ProviderError::Http(e) if e.is_timeout() => KambotError::timeout(OPERATION),
            ProviderError::Http(e) => KambotError::Transport(e.to_string()),
            ProviderError::NotConfigured(msg) => KambotError::Unavailable(msg),
            ProviderError::InvalidResponse(msg) => KambotError::MalformedResponse(msg),
            ProviderError::Json(e) => KambotError::MalformedResponse(e.to_string()),
            other @ (ProviderError::RequestFailed(_)
            | ProviderError::AuthFailed(_)
            | ProviderError::RateLimited(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::ContentFiltered) => KambotError::Provider {
                message: other.to_string(),
            },
        }
    }
}
