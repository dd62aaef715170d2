//! Validation stage: the only stage that sees raw user text.

use async_trait::async_trait;
use tracing::warn;

use kambot_security::{InputScreen, find_forbidden_char, sanitize};
use kambot_types::{RejectReason, StageName};

use super::state::{PipelineState, StageResult};
use super::traits::Stage;

/// Rejects empty, oversized, control-character and injection-bearing
/// input; otherwise continues with the sanitized text.
pub struct ValidationStage {
    max_length: usize,
    rejection_message: String,
    screen: InputScreen,
}

impl ValidationStage {
    pub fn new(max_length: usize, rejection_message: impl Into<String>) -> Self {
        Self {
            max_length,
            rejection_message: rejection_message.into(),
            screen: InputScreen::injection(),
        }
    }

    fn reject(&self, detail: String) -> StageResult {
        warn!(detail = %detail, "input rejected by validation");
        StageResult::reject_with_detail(
            RejectReason::InvalidInput,
            self.rejection_message.clone(),
            detail,
        )
    }
}

#[async_trait]
impl Stage for ValidationStage {
    fn name(&self) -> StageName {
        StageName::Validation
    }

    async fn run(&self, state: &PipelineState) -> StageResult {
        let raw = state.request.text();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return self.reject("empty input".into());
        }

        let length = trimmed.chars().count();
        if length > self.max_length {
            return self.reject(format!(
                "input too long: {length} > {} characters",
                self.max_length
            ));
        }

        if let Some(c) = find_forbidden_char(trimmed) {
            return self.reject(format!("forbidden character U+{:04X}", c as u32));
        }

        let findings = self.screen.scan(trimmed);
        if !findings.is_empty() {
            let ids: Vec<&str> = findings.iter().map(|f| f.check_id.as_str()).collect();
            return self.reject(format!("screening matched {}", ids.join(", ")));
        }

        let clean = sanitize(trimmed);
        if clean.is_empty() {
            return self.reject("empty after sanitization".into());
        }

        StageResult::Continue(state.clone().with_sanitized_text(clean))
    }
}
