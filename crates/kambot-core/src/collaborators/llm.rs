//! Collaborators backed by an OpenAI-compatible chat completion provider.
//!
//! All four share one [`LlmClient`]. Classifier replies are parsed
//! strictly: anything that does not start with the expected keyword is a
//! [`KambotError::MalformedResponse`], which the pipeline treats as a
//! collaborator failure rather than a pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use kambot_llm::{ChatMessage, ChatRequest, Provider};
use kambot_types::config::ProviderSettings;
use kambot_types::{KambotError, Result, Snippet, Verdict};

use crate::pipeline::traits::{ModerationService, ResponseGenerator, SafetyVerifier, TopicClassifier};
use crate::prompts;

/// A provider plus the request defaults every collaborator uses.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: Option<i32>,
    generation_temperature: f64,
    classifier_temperature: f64,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, settings: &ProviderSettings) -> Self {
        Self {
            provider,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            generation_temperature: settings.generation_temperature,
            classifier_temperature: settings.classifier_temperature,
        }
    }

    async fn ask(&self, system: String, user: String, temperature: f64) -> Result<String> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        )
        .with_temperature(temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(&request).await?;
        let text = response.text().unwrap_or_default().trim().to_string();
        debug!(provider = self.provider.name(), chars = text.len(), "completion received");
        if text.is_empty() {
            return Err(KambotError::MalformedResponse("empty completion".into()));
        }
        Ok(text)
    }
}

// ── Generator ───────────────────────────────────────────────────────────

pub struct LlmGenerator {
    client: LlmClient,
    disclaimer: String,
}

impl LlmGenerator {
    pub fn new(client: LlmClient, disclaimer: impl Into<String>) -> Self {
        Self {
            client,
            disclaimer: disclaimer.into(),
        }
    }
}

#[async_trait]
impl ResponseGenerator for LlmGenerator {
    async fn generate(&self, text: &str, context: &[Snippet], feedback: &[String]) -> Result<String> {
        self.client
            .ask(
                prompts::generator_system(&self.disclaimer),
                prompts::generator_user(text, context, feedback),
                self.client.generation_temperature,
            )
            .await
    }
}

// ── Topic ───────────────────────────────────────────────────────────────

pub struct LlmTopicClassifier {
    client: LlmClient,
}

impl LlmTopicClassifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopicClassifier for LlmTopicClassifier {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        let reply = self
            .client
            .ask(
                prompts::TOPIC_SYSTEM.into(),
                prompts::question(text),
                self.client.classifier_temperature,
            )
            .await?;
        match leading_word(&reply).as_str() {
            "YES" => Ok(Verdict::pass().with_explanation("classifier: YES")),
            "NO" => Ok(Verdict::fail("classifier: NO")),
            _ => Err(malformed("YES or NO", &reply)),
        }
    }
}

// ── Moderation ──────────────────────────────────────────────────────────

pub struct LlmModeration {
    client: LlmClient,
}

impl LlmModeration {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModerationService for LlmModeration {
    async fn check(&self, text: &str) -> Result<Verdict> {
        let reply = self
            .client
            .ask(
                prompts::MODERATION_SYSTEM.into(),
                prompts::question(text),
                self.client.classifier_temperature,
            )
            .await?;
        match leading_word(&reply).as_str() {
            "ALLOW" => Ok(Verdict::pass()),
            "BLOCK" => Ok(Verdict::fail(
                after_colon(&reply).unwrap_or("blocked by moderation"),
            )),
            _ => Err(malformed("ALLOW or BLOCK", &reply)),
        }
    }
}

// ── Verifier ────────────────────────────────────────────────────────────

pub struct LlmSafetyVerifier {
    client: LlmClient,
}

impl LlmSafetyVerifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SafetyVerifier for LlmSafetyVerifier {
    async fn verify(&self, candidate: &str) -> Result<Verdict> {
        let reply = self
            .client
            .ask(
                prompts::VERIFIER_SYSTEM.into(),
                prompts::response_to_verify(candidate),
                self.client.classifier_temperature,
            )
            .await?;
        match leading_word(&reply).as_str() {
            "SAFE" => Ok(Verdict::pass()),
            "UNSAFE" => Ok(Verdict::fail(
                after_colon(&reply).unwrap_or("response contains medical advice"),
            )),
            _ => Err(malformed("SAFE or UNSAFE", &reply)),
        }
    }
}

/// First word of a reply, uppercased, punctuation stripped.
fn leading_word(reply: &str) -> String {
    reply
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_uppercase()
}

/// Text after the first colon, if non-empty.
fn after_colon(reply: &str) -> Option<&str> {
    reply
        .split_once(':')
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !rest.is_empty())
}

fn malformed(expected: &str, reply: &str) -> KambotError {
    let preview: String = reply.chars().take(40).collect();
    KambotError::MalformedResponse(format!("expected {expected}, got {preview:?}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use kambot_llm::{ChatResponse, Choice, ProviderError};

    /// Replies with a fixed text and remembers the last request.
    struct Canned {
        reply: Option<String>,
        last: Mutex<Option<ChatRequest>>,
    }

    impl Canned {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.into()),
                last: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Provider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &ChatRequest) -> kambot_llm::Result<ChatResponse> {
            *self.last.lock().unwrap() = Some(request.clone());
            let Some(reply) = &self.reply else {
                return Err(ProviderError::AuthFailed("bad key".into()));
            };
            Ok(ChatResponse {
                id: "r1".into(),
                model: "test-model".into(),
                usage: None,
                choices: vec![Choice {
                    index: 0,
                    message: ChatMessage::assistant(reply.clone()),
                    finish_reason: Some("stop".into()),
                }],
            })
        }
    }

    fn client(provider: Arc<Canned>) -> LlmClient {
        let settings = ProviderSettings {
            model: "test-model".into(),
            ..ProviderSettings::default()
        };
        LlmClient::new(provider, &settings)
    }

    #[tokio::test]
    async fn topic_parses_yes_and_no() {
        let yes = LlmTopicClassifier::new(client(Canned::new("YES")));
        assert!(yes.classify("What is Kambo?").await.unwrap().passed());

        let no = LlmTopicClassifier::new(client(Canned::new("no.")));
        assert!(!no.classify("Best pizza?").await.unwrap().passed());
    }

    #[tokio::test]
    async fn topic_rejects_unexpected_reply() {
        let maybe = LlmTopicClassifier::new(client(Canned::new("Maybe, it depends")));
        let err = maybe.classify("?").await.unwrap_err();
        assert!(matches!(err, KambotError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn moderation_block_carries_reason() {
        let m = LlmModeration::new(client(Canned::new("BLOCK: harm to others")));
        let v = m.check("...").await.unwrap();
        assert!(!v.passed());
        assert_eq!(v.explanation(), Some("harm to others"));
    }

    #[tokio::test]
    async fn verifier_unsafe_feedback() {
        let v = LlmSafetyVerifier::new(client(Canned::new("UNSAFE: remove the dosage figure")));
        let verdict = v.verify("Take 3 points.").await.unwrap();
        assert_eq!(verdict.explanation(), Some("remove the dosage figure"));

        let v = LlmSafetyVerifier::new(client(Canned::new("UNSAFE")));
        let verdict = v.verify("Take 3 points.").await.unwrap();
        assert_eq!(verdict.explanation(), Some("response contains medical advice"));

        let v = LlmSafetyVerifier::new(client(Canned::new("SAFE")));
        assert!(v.verify("Kambo is traditional.").await.unwrap().passed());
    }

    #[tokio::test]
    async fn generator_sends_feedback_and_settings() {
        let provider = Canned::new("Kambo is a traditional practice.");
        let generator = LlmGenerator::new(client(provider.clone()), "Not medical advice.");
        let feedback = vec!["mentions dosage".to_string()];
        let answer = generator
            .generate("How much Kambo?", &[], &feedback)
            .await
            .unwrap();
        assert_eq!(answer, "Kambo is a traditional practice.");

        let sent = provider.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.model, "test-model");
        assert_eq!(sent.temperature, Some(0.1));
        assert_eq!(sent.messages[0].role, "system");
        assert!(sent.messages[1].content.contains("- mentions dosage"));
    }

    #[tokio::test]
    async fn provider_errors_become_collaborator_errors() {
        let generator = LlmGenerator::new(client(Canned::failing()), "x");
        let err = generator.generate("q", &[], &[]).await.unwrap_err();
        assert!(matches!(err, KambotError::Provider { .. }));
    }

    #[tokio::test]
    async fn blank_completion_is_malformed() {
        let generator = LlmGenerator::new(client(Canned::new("   ")), "x");
        let err = generator.generate("q", &[], &[]).await.unwrap_err();
        assert!(matches!(err, KambotError::MalformedResponse(_)));
    }

    #[test]
    fn leading_word_normalizes() {
        assert_eq!(leading_word("yes, it is"), "YES");
        assert_eq!(leading_word("UNSAFE: x"), "UNSAFE");
        assert_eq!(leading_word("**SAFE**"), "SAFE");
        assert_eq!(leading_word(""), "");
    }
}
