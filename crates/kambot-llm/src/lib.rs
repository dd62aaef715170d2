//! Chat completion client used by kambot's LLM-backed collaborators.
//!
//! The generator and the safety verifier both send a short message list to
//! an OpenAI-compatible `/chat/completions` endpoint and read back the text
//! of the first choice. This crate owns that exchange and nothing else:
//! prompts live in `kambot-core`, retry policy lives in the pipeline.
//!
//! - [`Provider`]: the call, as a trait so tests can script it
//! - [`OpenAiCompatProvider`]: reqwest implementation
//! - [`status_error`]: how non-2xx answers are classified
//! - [`ProviderError`]: folds into [`kambot_types::KambotError`]
//!
//! ```rust,ignore
//! let provider = OpenAiCompatProvider::new(LlmProviderConfig::from(&config.provider));
//! let request = ChatRequest::new(&config.provider.model, vec![ChatMessage::user("What is Kambo?")])
//!     .with_temperature(0.0);
//! let text = provider.complete(&request).await?.text().unwrap_or_default().to_owned();
//! ```

pub mod config;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use config::LlmProviderConfig;
pub use error::{ProviderError, Result};
pub use openai_compat::{OpenAiCompatProvider, status_error};
pub use provider::Provider;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Choice, Usage};
