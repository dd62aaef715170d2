//! Keyword-based topic classifier and safety verifier.
//!
//! Level-0 implementations: no model, just case-insensitive matching.

use async_trait::async_trait;
use regex::Regex;

use kambot_types::{Result, Verdict};

use crate::pipeline::traits::{SafetyVerifier, TopicClassifier};

/// Words that mark a question as belonging to the Kambo domain.
pub const DEFAULT_TOPICS: &[&str] = &[
    "kambo",
    "ceremony",
    "traditional",
    "amazonian",
    "medicine",
    "purification",
    "healing",
    "practitioner",
    "safety",
    "benefits",
    "research",
    "history",
    "preparation",
    "contraindications",
];

/// Phrases that turn an educational answer into medical advice.
pub const MEDICAL_INDICATORS: &[&str] = &[
    "you should",
    "you must",
    "you need to",
    "take this",
    "use this",
    "prescription",
    "dosage",
    "treatment",
    "cure",
    "heal",
    "diagnose",
    "recommend medication",
    "medical treatment",
    "take kambo",
    "use kambo",
    "apply kambo",
];

/// Lowercase each phrase and compile a case-insensitive whole-word matcher
/// for it. Inner spaces match any run of whitespace.
fn word_matchers<I, S>(phrases: I) -> Vec<(String, Regex)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    phrases
        .into_iter()
        .filter_map(|p| {
            let phrase = p.into().to_lowercase();
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&phrase).replace(' ', r"\s+"));
            Regex::new(&pattern).ok().map(|re| (phrase, re))
        })
        .collect()
}

fn matches_in<'a>(matchers: &'a [(String, Regex)], text: &str) -> Vec<&'a str> {
    matchers
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(phrase, _)| phrase.as_str())
        .collect()
}

// ── Topic ───────────────────────────────────────────────────────────────

/// On topic when any domain keyword appears as a whole word, so
/// "prehistory" does not count as "history".
///
/// Confidence grows with the number of distinct matches and saturates at
/// three.
pub struct KeywordTopicClassifier {
    topics: Vec<(String, Regex)>,
}

impl KeywordTopicClassifier {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: word_matchers(topics),
        }
    }
}

impl Default for KeywordTopicClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOPICS.iter().copied())
    }
}

#[async_trait]
impl TopicClassifier for KeywordTopicClassifier {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        let matched = matches_in(&self.topics, text);

        if matched.is_empty() {
            return Ok(Verdict::fail("no domain keywords").with_confidence(0.0));
        }
        let confidence = (matched.len() as f32 / 3.0).min(1.0);
        Ok(Verdict::pass()
            .with_explanation(format!("matched: {}", matched.join(", ")))
            .with_confidence(confidence))
    }
}

// ── Safety ──────────────────────────────────────────────────────────────

/// Fails a candidate that contains any medical-advice indicator.
///
/// Indicators match on word boundaries, so "heal" does not trip on
/// "healthcare" or "healing". The feedback names every indicator found.
pub struct KeywordSafetyVerifier {
    indicators: Vec<(String, Regex)>,
}

impl KeywordSafetyVerifier {
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            indicators: word_matchers(indicators),
        }
    }

    /// Indicators found in `text`, in catalog order.
    pub fn findings<'a>(&'a self, text: &str) -> Vec<&'a str> {
        matches_in(&self.indicators, text)
    }
}

impl Default for KeywordSafetyVerifier {
    fn default() -> Self {
        Self::new(MEDICAL_INDICATORS.iter().copied())
    }
}

#[async_trait]
impl SafetyVerifier for KeywordSafetyVerifier {
    async fn verify(&self, candidate: &str) -> Result<Verdict> {
        let found = self.findings(candidate);
        if found.is_empty() {
            return Ok(Verdict::pass());
        }
        let quoted: Vec<String> = found.iter().map(|f| format!("'{f}'")).collect();
        Ok(Verdict::fail(format!(
            "Remove medical advice: the response contains {}",
            quoted.join(", ")
        )))
    }
}
