//! Client for OpenAI-compatible chat completion endpoints.
//!
//! One POST to `{base_url}/chat/completions` per call, no streaming and no
//! retries: the pipeline owns retry policy and bounds every call with its
//! own timeout. Non-2xx answers are classified by [`status_error`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::LlmProviderConfig;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse};

/// Chat completion client for one configured endpoint.
pub struct OpenAiCompatProvider {
    config: LlmProviderConfig,
    http: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    /// The API key is read from `config.api_key_env` on every call.
    pub fn new(config: LlmProviderConfig) -> Self {
        let http = http_client(config.timeout_secs());
        Self {
            config,
            http,
            api_key: None,
        }
    }

    /// Use `api_key` instead of the environment.
    pub fn with_api_key(config: LlmProviderConfig, api_key: String) -> Self {
        Self {
            api_key: Some(api_key),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &LlmProviderConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> Result<String> {
        match &self.api_key {
            Some(key) => Ok(key.clone()),
            None => std::env::var(&self.config.api_key_env).map_err(|_| {
                ProviderError::NotConfigured(format!("set {} env var", self.config.api_key_env))
            }),
        }
    }
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "http client build failed, using defaults");
            reqwest::Client::new()
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let key = self.api_key()?;
        debug!(
            provider = %self.config.name,
            model = %request.model,
            temperature = ?request.temperature,
            messages = request.messages.len(),
            "chat completion request"
        );

        let mut builder = self.http.post(self.endpoint()).bearer_auth(key).json(request);
        for (name, value) in &self.config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status, &body, &request.model);
            warn!(provider = %self.config.name, status = status.as_u16(), error = %err, "provider refused request");
            return Err(err);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {e}")))?;
        check_choices(&parsed)?;

        debug!(
            provider = %self.config.name,
            model = %parsed.model,
            total_tokens = parsed.usage.as_ref().map(|u| u.total_tokens),
            "chat completion received"
        );
        Ok(parsed)
    }
}

/// Map a non-success HTTP answer to a [`ProviderError`].
///
/// A 429 whose body talks about quota or billing is permanent and becomes
/// `RequestFailed`; any other 429 is `RateLimited`. Wait hints are not
/// parsed since the pipeline never sleeps on them.
pub fn status_error(status: StatusCode, body: &str, model: &str) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS if is_quota_exhausted(body) => ProviderError::RequestFailed(
            error_message(body).unwrap_or_else(|| "quota exhausted".into()),
        ),
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimited(error_message(body).unwrap_or_else(|| body.to_string()))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::AuthFailed(error_message(body).unwrap_or_else(|| body.to_string()))
        }
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(format!("model '{model}': {body}")),
        _ => ProviderError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

/// A completion is usable only if its first choice carries text the
/// provider did not cut for policy reasons.
fn check_choices(response: &ChatResponse) -> Result<()> {
    let Some(first) = response.choices.first() else {
        return Err(ProviderError::InvalidResponse("response has no choices".into()));
    };
    if first.finish_reason.as_deref() == Some("content_filter") {
        return Err(ProviderError::ContentFiltered);
    }
    Ok(())
}

fn is_quota_exhausted(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["insufficient_quota", "quota exceeded", "exhausted", "billing", "spending limit"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// `{"error": {"message": "..."}}` or `{"error": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(String::from)
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.config.name)
            .field("base_url", &self.config.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
