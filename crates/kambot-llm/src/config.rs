//! Where and how to reach a chat completion endpoint.
//!
//! Built from the `provider` section of the kambot config through
//! `From<&ProviderSettings>`; sampling options stay on the request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use kambot_types::config::ProviderSettings;

/// Client-side ceiling on one HTTP exchange. The pipeline's collaborator
/// timeout is normally much shorter and fires first.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Label for logs.
    pub name: String,

    /// Root of the API; `/chat/completions` is appended.
    pub base_url: String,

    /// Name of the env var holding the bearer token, not the token.
    pub api_key_env: String,

    /// Sent verbatim with every request (Azure `api-version`, gateways).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LlmProviderConfig {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

impl From<&ProviderSettings> for LlmProviderConfig {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            name: settings.name.clone(),
            base_url: settings.base_url.clone(),
            api_key_env: settings.api_key_env.clone(),
            headers: HashMap::new(),
            timeout_secs: None,
        }
    }
}
