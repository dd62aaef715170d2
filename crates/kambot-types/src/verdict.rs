//! Classifier verdicts and retrieved reference snippets.

use serde::{Deserialize, Serialize};

/// A pass/fail decision from a classification collaborator.
///
/// `passed` always means "the gate is open": no moderation violation, the
/// question is on topic, or the candidate response is safe. When a
/// verification verdict fails, its explanation is the feedback that steers
/// the next generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
}

impl Verdict {
    /// A passing verdict with no explanation.
    pub fn pass() -> Self {
        Self {
            passed: true,
            explanation: None,
            confidence: None,
        }
    }

    /// A failing verdict carrying an explanation.
    pub fn fail(explanation: impl Into<String>) -> Self {
        Self {
            passed: false,
            explanation: Some(explanation.into()),
            confidence: None,
        }
    }

    /// Attach (or replace) the explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Attach a confidence in `0.0..=1.0`; out-of-range values are clamped.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Whether the gate is open.
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Free-text explanation, if the collaborator gave one.
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Classifier confidence, if reported.
    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }
}

/// One piece of reference material returned by the context retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// The reference text.
    pub text: String,
    /// Where the text came from (document id, URL, collection name).
    pub source_id: String,
}

impl Snippet {
    /// Create a snippet.
    pub fn new(text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
        }
    }
}
