//! Topic stage: keeps the assistant inside its domain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use kambot_types::{RejectReason, StageName};

use super::bounded;
use super::state::{PipelineState, StageResult};
use super::traits::{Stage, TopicClassifier};

pub struct TopicStage {
    classifier: Arc<dyn TopicClassifier>,
    timeout: Duration,
    redirect_message: String,
    unavailable_message: String,
}

impl TopicStage {
    pub fn new(
        classifier: Arc<dyn TopicClassifier>,
        timeout: Duration,
        redirect_message: impl Into<String>,
        unavailable_message: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            timeout,
            redirect_message: redirect_message.into(),
            unavailable_message: unavailable_message.into(),
        }
    }
}

#[async_trait]
impl Stage for TopicStage {
    fn name(&self) -> StageName {
        StageName::Topic
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        let verdict = bounded(
            "topic.classify",
            self.timeout,
            self.classifier.classify(state.text()),
        )
        .await;

        match verdict {
            Ok(v) if v.passed() => {
                debug!(
                    confidence = ?v.confidence(),
                    explanation = v.explanation().unwrap_or(""),
                    "on topic"
                );
                StageResult::Continue(state.clone().with_topic(v))
            }
            Ok(v) => StageResult::reject_with_detail(
                RejectReason::OffTopic,
                self.redirect_message.clone(),
                v.explanation().unwrap_or("off topic").to_string(),
            ),
            Err(e) => {
                warn!(error = %e, "topic classifier unavailable");
                StageResult::reject_with_detail(
                    RejectReason::TopicUnavailable,
                    self.unavailable_message.clone(),
                    e.to_string(),
                )
            }
        }
    }
}
