//! Stage contract and collaborator trait definitions.
//!
//! The pipeline never talks to a model, classifier, store or log directly.
//! Every external dependency sits behind one of the traits below and is
//! injected when the [`Coordinator`](super::coordinator::Coordinator) is
//! built:
//!
//! 1. **[`ModerationService`]** -- policy-violation classifier
//! 2. **[`TopicClassifier`]** -- domain relevance classifier
//! 3. **[`ContextRetriever`]** -- reference material lookup
//! 4. **[`ResponseGenerator`]** -- candidate answer generation
//! 5. **[`SafetyVerifier`]** -- candidate safety check
//! 6. **[`AuditSink`]** -- terminal record of every run
//!
//! All of them must be safe to share between concurrent runs.

use std::sync::Arc;

use async_trait::async_trait;

use kambot_types::{Result, Snippet, StageName, Verdict};

use super::state::{PipelineState, StageResult};
use crate::audit::AuditRecord;

// ── Stage contract ──────────────────────────────────────────────────────

/// One unit of the pipeline.
///
/// A stage reads the state it is given and describes what should happen
/// next. It never mutates its input; an updated state travels back inside
/// [`StageResult::Continue`]. All I/O goes through collaborators held by
/// the stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which stage this is.
    fn name(&self) -> StageName;

    /// Run the stage against `state`.
    async fn run(&self, state: &PipelineState) -> StageResult;
}

// ── Collaborators ───────────────────────────────────────────────────────

/// Policy-violation classifier. A passing verdict means no violation.
#[async_trait]
pub trait ModerationService: Send + Sync {
    async fn check(&self, text: &str) -> Result<Verdict>;
}

/// Domain relevance classifier. A passing verdict means on topic.
#[async_trait]
pub trait TopicClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Verdict>;
}

/// Reference material lookup. An empty result is not an error.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, text: &str) -> Result<Vec<Snippet>>;
}

/// Candidate answer generation.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce a candidate answer for `text`.
    ///
    /// `feedback` is empty on the first attempt. On later attempts it holds
    /// the verification feedback of every earlier attempt, oldest first.
    async fn generate(&self, text: &str, context: &[Snippet], feedback: &[String])
    -> Result<String>;
}

/// Candidate safety check.
///
/// A failing verdict's explanation is the feedback that steers the next
/// generation attempt.
#[async_trait]
pub trait SafetyVerifier: Send + Sync {
    async fn verify(&self, candidate: &str) -> Result<Verdict>;
}

/// Terminal record of every run.
///
/// Errors are logged by the coordinator and never change the outcome.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// The full set of collaborators a coordinator is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub moderation: Arc<dyn ModerationService>,
    pub topic: Arc<dyn TopicClassifier>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub verifier: Arc<dyn SafetyVerifier>,
    pub audit: Arc<dyn AuditSink>,
}
