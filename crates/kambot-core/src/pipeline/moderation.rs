//! Moderation stage. Fails closed: a collaborator error is a rejection,
//! never a pass.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use kambot_types::{RejectReason, StageName};

use super::bounded;
use super::state::{PipelineState, StageResult};
use super::traits::{ModerationService, Stage};

pub struct ModerationStage {
    service: Arc<dyn ModerationService>,
    timeout: Duration,
    refusal_message: String,
    unavailable_message: String,
}

impl ModerationStage {
    pub fn new(
        service: Arc<dyn ModerationService>,
        timeout: Duration,
        refusal_message: impl Into<String>,
        unavailable_message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            timeout,
            refusal_message: refusal_message.into(),
            unavailable_message: unavailable_message.into(),
        }
    }
}

#[async_trait]
impl Stage for ModerationStage {
    fn name(&self) -> StageName {
        StageName::Moderation
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        let verdict = bounded(
            "moderation.check",
            self.timeout,
            self.service.check(state.text()),
        )
        .await;

        match verdict {
            Ok(v) if v.passed() => StageResult::Continue(state.clone().with_moderation(v)),
            Ok(v) => {
                let detail = v.explanation().unwrap_or("flagged").to_string();
                warn!(detail = %detail, "moderation flagged input");
                StageResult::reject_with_detail(
                    RejectReason::PolicyViolation,
                    self.refusal_message.clone(),
                    detail,
                )
            }
            Err(e) => {
                warn!(error = %e, "moderation unavailable");
                StageResult::reject_with_detail(
                    RejectReason::ModerationUnavailable,
                    self.unavailable_message.clone(),
                    e.to_string(),
                )
            }
        }
    }
}
