//! The seam between the pipeline's LLM-backed collaborators and HTTP.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// Something that turns a [`ChatRequest`] into a [`ChatResponse`].
///
/// [`OpenAiCompatProvider`](crate::openai_compat::OpenAiCompatProvider) is
/// the only network implementation. Tests in `kambot-core` substitute
/// scripted providers so the generator and verifier can be exercised
/// without a server.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// One completion, no retries. Callers bound the call with their own
    /// deadline on top of the client timeout.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
