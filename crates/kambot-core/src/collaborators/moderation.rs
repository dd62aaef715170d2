//! Offline moderation over the harmful-intent screening catalog.

use async_trait::async_trait;

use kambot_security::InputScreen;
use kambot_types::{Result, Verdict};

use crate::pipeline::traits::ModerationService;

pub struct PatternModeration {
    screen: InputScreen,
}

impl PatternModeration {
    pub fn new(screen: InputScreen) -> Self {
        Self { screen }
    }
}

impl Default for PatternModeration {
    fn default() -> Self {
        Self::new(InputScreen::harmful_intent())
    }
}

#[async_trait]
impl ModerationService for PatternModeration {
    async fn check(&self, text: &str) -> Result<Verdict> {
        let findings = self.screen.scan(text);
        if findings.is_empty() {
            return Ok(Verdict::pass());
        }
        let labels: Vec<String> = findings
            .iter()
            .map(|f| format!("{} ({})", f.check_id, f.category))
            .collect();
        Ok(Verdict::fail(format!("matched {}", labels.join(", "))))
    }
}
