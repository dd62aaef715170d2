//! Configuration schema types.
//!
//! Every struct supports both `snake_case` and `camelCase` field names in
//! JSON via `#[serde(alias)]`, and every field has a default, so an empty
//! object (or no file at all) yields a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KambotError;

/// Default retry budget for the generation/verification loop.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default maximum accepted input length, in characters.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 2000;

const DEFAULT_DISCLAIMER: &str = "This information is for educational purposes only and is not \
intended as medical advice. Always consult with a qualified healthcare provider before making \
any health-related decisions.";

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for kambot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pipeline policy (retry budget, limits, timeouts).
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// User-facing message texts.
    #[serde(default)]
    pub messages: MessagesConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Offline knowledge base settings.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Audit trail settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Config {
    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), KambotError> {
        let p = &self.pipeline;
        if p.max_attempts == 0 {
            return Err(invalid("pipeline.max_attempts must be at least 1"));
        }
        if p.max_input_length == 0 {
            return Err(invalid("pipeline.max_input_length must be at least 1"));
        }
        if p.collaborator_timeout_ms == 0 || p.run_deadline_ms == 0 {
            return Err(invalid("pipeline timeouts must be non-zero"));
        }
        if self.messages.safe_fallback.trim().is_empty() {
            return Err(invalid("messages.safe_fallback must not be empty"));
        }
        if self.knowledge.max_snippets == 0 {
            return Err(invalid("knowledge.max_snippets must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> KambotError {
    KambotError::ConfigInvalid {
        reason: reason.into(),
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Pipeline policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on generation/verification cycles per run.
    #[serde(default = "default_max_attempts", alias = "maxAttempts")]
    pub max_attempts: u32,

    /// Maximum input length in characters.
    #[serde(default = "default_max_input_length", alias = "maxInputLength")]
    pub max_input_length: usize,

    /// Timeout applied to every individual collaborator call.
    #[serde(default = "default_collaborator_timeout_ms", alias = "collaboratorTimeoutMs")]
    pub collaborator_timeout_ms: u64,

    /// Deadline for a whole run, from ingress to outcome.
    #[serde(default = "default_run_deadline_ms", alias = "runDeadlineMs")]
    pub run_deadline_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_max_input_length() -> usize {
    DEFAULT_MAX_INPUT_LENGTH
}
fn default_collaborator_timeout_ms() -> u64 {
    30_000
}
fn default_run_deadline_ms() -> u64 {
    120_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_input_length: default_max_input_length(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            run_deadline_ms: default_run_deadline_ms(),
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────────────

/// User-facing texts. All of them are static and pre-approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Shown when validation rejects the input.
    #[serde(default = "default_invalid_input", alias = "invalidInput")]
    pub invalid_input: String,

    /// Shown when moderation flags the input.
    #[serde(default = "default_policy_refusal", alias = "policyRefusal")]
    pub policy_refusal: String,

    /// Shown when the question is outside the domain.
    #[serde(default = "default_off_topic", alias = "offTopic")]
    pub off_topic: String,

    /// Served when every generation attempt failed verification.
    #[serde(default = "default_safe_fallback", alias = "safeFallback")]
    pub safe_fallback: String,

    /// Shown on infrastructure failure (the correlation id is appended).
    #[serde(default = "default_system_error", alias = "systemError")]
    pub system_error: String,

    /// Appended by generators to educational answers.
    #[serde(default = "default_disclaimer", alias = "medicalDisclaimer")]
    pub medical_disclaimer: String,
}

fn default_invalid_input() -> String {
    "I'm sorry, but I cannot process that request. Please rephrase your question.".into()
}
fn default_policy_refusal() -> String {
    "I'm not able to help with that request. I can share educational information about \
Kambo ceremonies and traditional Amazonian medicine."
        .into()
}
fn default_off_topic() -> String {
    "I can only answer questions related to Kambo ceremonies and traditional Amazonian \
medicine. Please ask about Kambo-related topics."
        .into()
}
fn default_safe_fallback() -> String {
    "I apologize, but I need to provide a more appropriate response. Please consult with \
qualified healthcare providers for medical advice."
        .into()
}
fn default_system_error() -> String {
    "I apologize, but I encountered an error processing your request. Please try again.".into()
}
fn default_disclaimer() -> String {
    DEFAULT_DISCLAIMER.into()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            invalid_input: default_invalid_input(),
            policy_refusal: default_policy_refusal(),
            off_topic: default_off_topic(),
            safe_fallback: default_safe_fallback(),
            system_error: default_system_error(),
            medical_disclaimer: default_disclaimer(),
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Connection settings for the OpenAI-compatible LLM endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Human-readable provider name.
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of the chat completion API.
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env", alias = "apiKeyEnv")]
    pub api_key_env: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for answer generation.
    #[serde(default = "default_generation_temperature", alias = "generationTemperature")]
    pub generation_temperature: f64,

    /// Sampling temperature for classifier/verifier calls.
    #[serde(default, alias = "classifierTemperature")]
    pub classifier_temperature: f64,

    /// Maximum tokens per generated answer.
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: Option<i32>,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_generation_temperature() -> f64 {
    0.1
}
fn default_max_tokens() -> Option<i32> {
    Some(1024)
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            generation_temperature: default_generation_temperature(),
            classifier_temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

// ── Knowledge ────────────────────────────────────────────────────────────

/// Offline knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file with `[{"text": ..., "source_id": ...}]` entries.
    /// The built-in snippets are used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum snippets returned per query.
    #[serde(default = "default_max_snippets", alias = "maxSnippets")]
    pub max_snippets: usize,
}

fn default_max_snippets() -> usize {
    3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_snippets: default_max_snippets(),
        }
    }
}

// ── Audit ────────────────────────────────────────────────────────────────

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Write one JSONL record per run.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audit file path. Defaults to `~/.kambot/audit.jsonl`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Resolve the audit file path, expanding a leading `~/`.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(raw) => expand_home(raw),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".kambot")
                .join("audit.jsonl"),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}
