//! Offline knowledge base retriever.
//!
//! Snippets are ranked by how many distinct query words they share with
//! the query (short and common words ignored). Ties keep catalog order.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use kambot_types::{KambotError, Result, Snippet};

use crate::pipeline::traits::ContextRetriever;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "who", "how", "why", "when", "where", "which",
    "does", "can", "with", "about", "this", "that", "from", "have", "has", "you", "your", "into",
    "there", "their", "they", "some", "any", "is", "a", "an", "of", "to", "in", "on", "do",
];

pub struct KnowledgeBase {
    snippets: Vec<Snippet>,
    max_results: usize,
}

impl KnowledgeBase {
    pub fn new(snippets: Vec<Snippet>, max_results: usize) -> Self {
        Self {
            snippets,
            max_results: max_results.max(1),
        }
    }

    /// The built-in reference snippets.
    pub fn builtin(max_results: usize) -> Self {
        Self::new(builtin_snippets(), max_results)
    }

    /// Load snippets from a JSON array of `{"text", "source_id"}` objects.
    pub fn load(path: &Path, max_results: usize) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snippets: Vec<Snippet> = serde_json::from_str(&raw)?;
        if snippets.is_empty() {
            return Err(KambotError::ConfigInvalid {
                reason: format!("knowledge file {} has no snippets", path.display()),
            });
        }
        Ok(Self::new(snippets, max_results))
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippets relevant to `query`, best first.
    pub fn search(&self, query: &str) -> Vec<Snippet> {
        let terms = terms_of(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Snippet)> = self
            .snippets
            .iter()
            .filter_map(|s| {
                let words = terms_of(&s.text);
                let score = terms.iter().filter(|t| words.contains(*t)).count();
                (score > 0).then_some((score, s))
            })
            .collect();
        // Stable sort keeps catalog order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.max_results)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl ContextRetriever for KnowledgeBase {
    async fn retrieve(&self, text: &str) -> Result<Vec<Snippet>> {
        let found = self.search(text);
        debug!(found = found.len(), catalog = self.snippets.len(), "knowledge search");
        Ok(found)
    }
}

fn terms_of(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn builtin_snippets() -> Vec<Snippet> {
    vec![
        Snippet::new(
            "Kambo is a traditional Amazonian medicine used in ceremonial contexts for \
purification and healing.",
            "traditional_knowledge",
        ),
        Snippet::new(
            "Kambo ceremonies should only be conducted by trained practitioners in safe \
environments.",
            "safety_guidelines",
        ),
        Snippet::new(
            "Research has shown potential benefits of Kambo in traditional healing practices, \
though more studies are needed.",
            "research_papers",
        ),
        Snippet::new(
            "Kambo comes from the secretion of the giant monkey frog (Phyllomedusa bicolor) and \
has a long history of ceremonial use among indigenous peoples of the Amazon basin, including \
the Matses and Katukina.",
            "cultural_history",
        ),
        Snippet::new(
            "Commonly cited contraindications include heart conditions, pregnancy, and a history \
of stroke; anyone considering a ceremony is encouraged to discuss it with a qualified \
healthcare provider first.",
            "safety_guidelines",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_populated() {
        assert_eq!(KnowledgeBase::builtin(3).len(), 5);
    }

    #[test]
    fn ranks_by_shared_terms() {
        let kb = KnowledgeBase::builtin(3);
        let found = kb.search("What is the history of Kambo ceremonial use?");
        assert!(!found.is_empty());
        assert_eq!(found[0].source_id, "cultural_history");
    }

    #[test]
    fn stopwords_alone_find_nothing() {
        let kb = KnowledgeBase::builtin(3);
        assert!(kb.search("what is the").is_empty());
    }

    #[test]
    fn respects_max_results() {
        let kb = KnowledgeBase::builtin(2);
        assert!(kb.search("kambo").len() <= 2);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"[{"text": "Sapo is another name for Kambo.", "source_id": "names"}]"#,
        )
        .unwrap();
        let kb = KnowledgeBase::load(&path, 3).unwrap();
        assert_eq!(kb.search("other names for sapo")[0].source_id, "names");
    }

    #[test]
    fn empty_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            KnowledgeBase::load(&path, 3),
            Err(KambotError::ConfigInvalid { .. })
        ));
    }
}
