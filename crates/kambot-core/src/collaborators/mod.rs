//! Collaborator implementations.
//!
//! | Concern | Offline | LLM-backed |
//! |---------|---------|------------|
//! | moderation | [`PatternModeration`] | [`LlmModeration`] |
//! | topic | [`KeywordTopicClassifier`] | [`LlmTopicClassifier`] |
//! | context | [`KnowledgeBase`] | -- |
//! | generation | [`TemplateGenerator`] | [`LlmGenerator`] |
//! | verification | [`KeywordSafetyVerifier`] | [`LlmSafetyVerifier`] |
//!
//! The offline set needs no network and no API key.

pub mod keyword;
pub mod knowledge;
pub mod llm;
pub mod moderation;
pub mod template;

pub use keyword::{KeywordSafetyVerifier, KeywordTopicClassifier};
pub use knowledge::KnowledgeBase;
pub use llm::{LlmClient, LlmGenerator, LlmModeration, LlmSafetyVerifier, LlmTopicClassifier};
pub use moderation::PatternModeration;
pub use template::TemplateGenerator;
