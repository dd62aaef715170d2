//! Verification stage: pass, or ask for another attempt with feedback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use kambot_types::{RejectReason, StageName};

use super::bounded;
use super::state::{PipelineState, StageResult};
use super::traits::{SafetyVerifier, Stage};

/// Feedback used when a verifier fails a candidate without explaining why.
pub const DEFAULT_FEEDBACK: &str =
    "The previous response was not safe to show. Give educational information only.";

pub struct VerificationStage {
    verifier: Arc<dyn SafetyVerifier>,
    timeout: Duration,
    failure_message: String,
}

impl VerificationStage {
    pub fn new(
        verifier: Arc<dyn SafetyVerifier>,
        timeout: Duration,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            timeout,
            failure_message: failure_message.into(),
        }
    }
}

#[async_trait]
impl Stage for VerificationStage {
    fn name(&self) -> StageName {
        StageName::Verification
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        let Some(candidate) = state.candidate.as_deref() else {
            return StageResult::reject_with_detail(
                RejectReason::VerificationUnavailable,
                self.failure_message.clone(),
                "no candidate to verify",
            );
        };

        match bounded(
            "verification.verify",
            self.timeout,
            self.verifier.verify(candidate),
        )
        .await
        {
            Ok(v) if v.passed() => StageResult::Continue(state.clone().with_verification(v)),
            Ok(v) => {
                let feedback = v
                    .explanation()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or(DEFAULT_FEEDBACK)
                    .to_string();
                info!(attempt = state.attempts, feedback = %feedback, "candidate failed verification");
                StageResult::Retry(feedback)
            }
            Err(e) => {
                warn!(error = %e, "verifier unavailable");
                StageResult::reject_with_detail(
                    RejectReason::VerificationUnavailable,
                    self.failure_message.clone(),
                    e.to_string(),
                )
            }
        }
    }
}
