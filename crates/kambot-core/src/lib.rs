//! # kambot-core
//!
//! Request orchestration for the kambot educational assistant.
//!
//! Contains the staged safety pipeline (validation, moderation, topic,
//! context, generation and verification), the retry controller, the
//! coordinator that turns a run into exactly one outcome, the audit
//! trail, and the offline and LLM-backed collaborator implementations.

pub mod audit;
pub mod bootstrap;
pub mod collaborators;
pub mod pipeline;
pub mod prompts;

pub use audit::{AuditQueue, AuditRecord, JsonlAuditSink, MemoryAuditSink, TracingAuditSink};
pub use bootstrap::build_coordinator;
pub use pipeline::coordinator::Coordinator;
pub use pipeline::traits::{
    AuditSink, Collaborators, ContextRetriever, ModerationService, ResponseGenerator,
    SafetyVerifier, Stage, TopicClassifier,
};
