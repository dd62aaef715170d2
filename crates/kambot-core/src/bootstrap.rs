//! Dependency wiring.
//!
//! Builds a [`Coordinator`] from a [`Config`], choosing between the
//! offline collaborator set (no network) and the LLM-backed one.
//!
//! ```rust,ignore
//! use kambot_core::bootstrap::build_coordinator;
//! use kambot_types::config::Config;
//!
//! let coordinator = build_coordinator(&Config::default(), true)?;
//! let outcome = coordinator.handle(Request::anonymous("What is Kambo?")).await;
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use kambot_llm::{LlmProviderConfig, OpenAiCompatProvider};
use kambot_types::config::{AuditConfig, Config};
use kambot_types::{KambotError, Result};

use crate::audit::{JsonlAuditSink, TracingAuditSink};
use crate::collaborators::{
    KeywordSafetyVerifier, KeywordTopicClassifier, KnowledgeBase, LlmClient, LlmGenerator,
    LlmModeration, LlmSafetyVerifier, LlmTopicClassifier, PatternModeration, TemplateGenerator,
};
use crate::pipeline::coordinator::Coordinator;
use crate::pipeline::traits::{AuditSink, Collaborators};

/// Validate `config` and build a coordinator.
///
/// With `offline` set, every collaborator runs locally. Otherwise
/// moderation, topic, generation and verification go to the configured
/// provider while retrieval still uses the local knowledge base.
pub fn build_coordinator(config: &Config, offline: bool) -> Result<Coordinator> {
    config.validate()?;
    let collaborators = if offline {
        offline_collaborators(config)?
    } else {
        online_collaborators(config)?
    };
    info!(
        offline,
        max_attempts = config.pipeline.max_attempts,
        "coordinator ready"
    );
    Ok(Coordinator::new(collaborators, config))
}

/// Collaborators that need no network and no API key.
pub fn offline_collaborators(config: &Config) -> Result<Collaborators> {
    Ok(Collaborators {
        moderation: Arc::new(PatternModeration::default()),
        topic: Arc::new(KeywordTopicClassifier::default()),
        retriever: Arc::new(knowledge_base(config)?),
        generator: Arc::new(TemplateGenerator::new(&config.messages.medical_disclaimer)),
        verifier: Arc::new(KeywordSafetyVerifier::default()),
        audit: audit_sink(&config.audit),
    })
}

/// Collaborators backed by the configured OpenAI-compatible provider.
///
/// Fails fast when the provider's API key variable is unset.
pub fn online_collaborators(config: &Config) -> Result<Collaborators> {
    let settings = &config.provider;
    if !settings.api_key_env.is_empty() && std::env::var(&settings.api_key_env).is_err() {
        return Err(KambotError::ConfigInvalid {
            reason: format!(
                "provider '{}' needs the {} env var (or run offline)",
                settings.name, settings.api_key_env
            ),
        });
    }

    let provider = OpenAiCompatProvider::new(LlmProviderConfig::from(settings));
    let client = LlmClient::new(Arc::new(provider), settings);
    debug!(provider = %settings.name, model = %settings.model, "llm collaborators wired");

    Ok(Collaborators {
        moderation: Arc::new(LlmModeration::new(client.clone())),
        topic: Arc::new(LlmTopicClassifier::new(client.clone())),
        retriever: Arc::new(knowledge_base(config)?),
        generator: Arc::new(LlmGenerator::new(
            client.clone(),
            &config.messages.medical_disclaimer,
        )),
        verifier: Arc::new(LlmSafetyVerifier::new(client)),
        audit: audit_sink(&config.audit),
    })
}

/// JSONL file when auditing is enabled, log events otherwise.
pub fn audit_sink(config: &AuditConfig) -> Arc<dyn AuditSink> {
    if config.enabled {
        let path = config.resolved_path();
        debug!(path = %path.display(), "audit trail file");
        Arc::new(JsonlAuditSink::new(path))
    } else {
        Arc::new(TracingAuditSink)
    }
}

fn knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let max = config.knowledge.max_snippets;
    match &config.knowledge.path {
        Some(path) => KnowledgeBase::load(path, max),
        None => Ok(KnowledgeBase::builtin(max)),
    }
}
