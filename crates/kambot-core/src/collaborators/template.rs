//! Template answer generator.
//!
//! Builds an answer from retrieved reference material and the medical
//! disclaimer without calling a model. On a retry, sentences containing
//! any phrase quoted in the verification feedback are left out.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use kambot_types::{Result, Snippet};

use crate::pipeline::traits::ResponseGenerator;

const NO_CONTEXT: &str = "I don't have specific information about that aspect of Kambo.";
const CLOSING: &str = "For more detailed information, please consult with qualified Kambo \
practitioners or healthcare providers.";

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'").expect("invalid quoted-phrase pattern"));

pub struct TemplateGenerator {
    disclaimer: String,
}

impl TemplateGenerator {
    pub fn new(disclaimer: impl Into<String>) -> Self {
        Self {
            disclaimer: disclaimer.into(),
        }
    }

    /// Phrases quoted in the feedback, lowercased.
    fn flagged(feedback: &[String]) -> Vec<String> {
        feedback
            .iter()
            .flat_map(|f| QUOTED.captures_iter(f))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }
}

#[async_trait]
impl ResponseGenerator for TemplateGenerator {
    async fn generate(&self, _text: &str, context: &[Snippet], feedback: &[String]) -> Result<String> {
        let flagged = Self::flagged(feedback);
        let sentences: Vec<&str> = context
            .iter()
            .flat_map(|s| split_sentences(&s.text))
            .filter(|sentence| {
                let lower = sentence.to_lowercase();
                !flagged.iter().any(|f| lower.contains(f.as_str()))
            })
            .collect();

        let body = if sentences.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            format!(
                "Based on available information about Kambo:\n\n{}",
                sentences.join(" ")
            )
        };
        Ok(format!("{body}\n\n{}\n\n{CLOSING}", self.disclaimer))
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}
