//! Generation stage.
//!
//! Produces one candidate per invocation. The first attempt sees only the
//! question and context; later attempts also receive the feedback from
//! every failed verification so far. A collaborator failure is reported as
//! `generation_failed` and is never retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use kambot_types::{RejectReason, StageName};

use super::bounded;
use super::state::{PipelineState, StageResult};
use super::traits::{ResponseGenerator, Stage};

pub struct GenerationStage {
    generator: Arc<dyn ResponseGenerator>,
    timeout: Duration,
    failure_message: String,
}

impl GenerationStage {
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        timeout: Duration,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            timeout,
            failure_message: failure_message.into(),
        }
    }
}

#[async_trait]
impl Stage for GenerationStage {
    fn name(&self) -> StageName {
        StageName::Generation
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        let feedback: &[String] = if state.attempts == 0 {
            &[]
        } else {
            &state.feedback
        };
        debug!(
            attempt = state.attempts,
            feedback = feedback.len(),
            "generating candidate"
        );

        let candidate = bounded(
            "generation.generate",
            self.timeout,
            self.generator
                .generate(state.text(), &state.context, feedback),
        )
        .await;

        match candidate {
            Ok(text) if text.trim().is_empty() => StageResult::reject_with_detail(
                RejectReason::GenerationFailed,
                self.failure_message.clone(),
                "empty candidate",
            ),
            Ok(text) => StageResult::Continue(state.clone().with_candidate(text)),
            Err(e) => {
                warn!(error = %e, attempt = state.attempts, "generation failed");
                StageResult::reject_with_detail(
                    RejectReason::GenerationFailed,
                    self.failure_message.clone(),
                    e.to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use kambot_types::{KambotError, Request, Result, Snippet};

    /// Remembers the feedback it was given and echoes the attempt.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ResponseGenerator for Recording {
        async fn generate(
            &self,
            _text: &str,
            _context: &[Snippet],
            feedback: &[String],
        ) -> Result<String> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(feedback.to_vec());
            Ok(format!("candidate {}", seen.len()))
        }
    }

    struct Failing;

    #[async_trait]
    impl ResponseGenerator for Failing {
        async fn generate(&self, _: &str, _: &[Snippet], _: &[String]) -> Result<String> {
            Err(KambotError::Provider {
                message: "quota exceeded".into(),
            })
        }
    }

    fn state() -> PipelineState {
        PipelineState::new(Request::anonymous("q")).with_sanitized_text("q")
    }

    #[tokio::test]
    async fn first_attempt_ignores_feedback_later_attempts_use_it() {
        let generator = Arc::new(Recording::default());
        let stage = GenerationStage::new(generator.clone(), Duration::from_secs(1), "err");

        let first = match stage.run(&state()).await {
            StageResult::Continue(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first.attempts, 1);
        assert_eq!(first.candidate.as_deref(), Some("candidate 1"));

        let retry_state = first.with_failed_verification("mentions dosage");
        let second = match stage.run(&retry_state).await {
            StageResult::Continue(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(second.attempts, 2);

        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], vec!["mentions dosage".to_string()]);
    }

    #[tokio::test]
    async fn failure_does_not_consume_an_attempt() {
        let stage = GenerationStage::new(Arc::new(Failing), Duration::from_secs(1), "err");
        match stage.run(&state()).await {
            StageResult::Reject { reason, detail, .. } => {
                assert_eq!(reason, RejectReason::GenerationFailed);
                assert!(detail.unwrap().contains("quota exceeded"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
