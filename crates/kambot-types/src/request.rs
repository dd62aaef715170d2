//! The inbound request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requester identifier used when the caller does not supply one.
pub const ANONYMOUS_REQUESTER: &str = "anonymous";

/// A single end-user question entering the pipeline.
///
/// Created once at ingress and never mutated afterwards: all fields are
/// private and only readable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    text: String,
    requester_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
    received_at: DateTime<Utc>,
}

impl Request {
    /// Create a request received now.
    pub fn new(text: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requester_id: requester_id.into(),
            conversation_id: None,
            received_at: Utc::now(),
        }
    }

    /// Create a request from an unidentified requester.
    pub fn anonymous(text: impl Into<String>) -> Self {
        Self::new(text, ANONYMOUS_REQUESTER)
    }

    /// Attach a conversation identifier.
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Override the receipt timestamp (replays, tests).
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// The raw, unsanitized question text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Who asked.
    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    /// The conversation this request belongs to, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// When the request was received.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
