//! Terminal outcomes and the response envelope returned to callers.
//!
//! An [`Outcome`] is the only value a pipeline run hands back. It is built
//! once, when the run ends, and never modified afterwards. [`ApiResponse`]
//! is its wire shape: success flag, user-facing text, correlation id and a
//! small metadata block.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason string carried by a [`Outcome::SafeFallback`] when the retry
/// budget is spent.
pub const SAFETY_EXHAUSTED: &str = "safety_exhausted";

// ── Stages ──────────────────────────────────────────────────────────────

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Input sanitization and screening.
    Validation,
    /// Policy-violation classifier.
    Moderation,
    /// Domain relevance classifier.
    Topic,
    /// Reference material retrieval.
    Context,
    /// Candidate response generation.
    Generation,
    /// Candidate safety verification.
    Verification,
}

impl StageName {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Moderation => "moderation",
            Self::Topic => "topic",
            Self::Context => "context",
            Self::Generation => "generation",
            Self::Verification => "verification",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Failure taxonomy ────────────────────────────────────────────────────

/// Coarse classification of why a run did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Input failed validation; the user can fix it.
    InputError,
    /// Moderation or topic rejection; the user can rephrase.
    PolicyError,
    /// Every generation attempt failed verification.
    SafetyExhausted,
    /// An external dependency failed.
    CollaboratorError,
}

impl FailureClass {
    /// Whether the user can get a different result by changing the question.
    pub fn user_correctable(&self) -> bool {
        matches!(self, Self::InputError | Self::PolicyError)
    }
}

/// Why a gate stage rejected the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Empty, oversized, control characters or injection markers.
    InvalidInput,
    /// The moderation collaborator flagged a violation.
    PolicyViolation,
    /// The question is outside the supported domain.
    OffTopic,
    /// The moderation collaborator failed; moderation never fails open.
    ModerationUnavailable,
    /// The topic collaborator failed.
    TopicUnavailable,
    /// The generation collaborator failed.
    GenerationFailed,
    /// The verification collaborator failed.
    VerificationUnavailable,
}

impl RejectReason {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::PolicyViolation => "policy_violation",
            Self::OffTopic => "off_topic",
            Self::ModerationUnavailable => "moderation_unavailable",
            Self::TopicUnavailable => "topic_unavailable",
            Self::GenerationFailed => "generation_failed",
            Self::VerificationUnavailable => "verification_unavailable",
        }
    }

    /// The taxonomy bucket this reason falls into.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidInput => FailureClass::InputError,
            Self::PolicyViolation | Self::OffTopic => FailureClass::PolicyError,
            Self::ModerationUnavailable
            | Self::TopicUnavailable
            | Self::GenerationFailed
            | Self::VerificationUnavailable => FailureClass::CollaboratorError,
        }
    }

    /// The stage that produces this reason.
    pub fn stage(&self) -> StageName {
        match self {
            Self::InvalidInput => StageName::Validation,
            Self::PolicyViolation | Self::ModerationUnavailable => StageName::Moderation,
            Self::OffTopic | Self::TopicUnavailable => StageName::Topic,
            Self::GenerationFailed => StageName::Generation,
            Self::VerificationUnavailable => StageName::Verification,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in [`Outcome::SystemError`].
///
/// The full cause is kept for the audit trail; callers only ever see the
/// generic system-error message plus the correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SystemCause {
    /// The caller cancelled the run.
    Cancelled,
    /// The per-run deadline elapsed.
    DeadlineExceeded,
    /// A collaborator failed at the given stage.
    Collaborator {
        /// Where the failure happened.
        stage: StageName,
        /// Collaborator error text.
        detail: String,
    },
    /// The run itself failed unexpectedly (a stage panicked).
    Internal {
        /// What went wrong.
        detail: String,
    },
}

impl fmt::Display for SystemCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline_exceeded"),
            Self::Collaborator { stage, detail } => write!(f, "{stage}: {detail}"),
            Self::Internal { detail } => write!(f, "internal: {detail}"),
        }
    }
}

/// Whether, and how, the candidate response was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// The run ended before verification.
    #[default]
    NotRun,
    /// A candidate passed verification.
    Passed,
    /// The last verified candidate failed.
    Failed,
}

// ── Outcome ─────────────────────────────────────────────────────────────

/// Summary data attached to every outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetadata {
    /// Correlation id of the run (also the audit record key).
    pub correlation_id: Uuid,
    /// Number of generation attempts made (0 if generation never ran).
    pub attempts: u32,
    /// The stage that rejected the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<StageName>,
    /// Verification status of the last candidate.
    #[serde(default)]
    pub verification: VerificationStatus,
    /// How many verification feedback strings were accumulated.
    #[serde(default)]
    pub feedback_count: usize,
    /// How many reference snippets were retrieved.
    #[serde(default)]
    pub context_snippets: usize,
    /// Topic classifier confidence, when it reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_confidence: Option<f32>,
}

impl OutcomeMetadata {
    /// Metadata for a run that has not progressed past ingress.
    pub fn new(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            attempts: 0,
            rejected_at: None,
            verification: VerificationStatus::NotRun,
            feedback_count: 0,
            context_snippets: 0,
            topic_confidence: None,
        }
    }
}

/// Final, immutable result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A verified response.
    Success {
        /// The candidate that passed verification.
        response: String,
        /// Run summary.
        metadata: OutcomeMetadata,
    },
    /// A gate rejected the question.
    Rejected {
        /// Which gate and why.
        reason: RejectReason,
        /// User-facing rejection text.
        message: String,
        /// Run summary.
        metadata: OutcomeMetadata,
    },
    /// The retry budget was spent; a pre-approved static message is served.
    SafeFallback {
        /// Always [`SAFETY_EXHAUSTED`] today.
        reason: String,
        /// The static fallback text; never a rejected candidate.
        message: String,
        /// Run summary.
        metadata: OutcomeMetadata,
    },
    /// Infrastructure failure, cancellation or deadline.
    SystemError {
        /// Full cause, for the audit trail only.
        cause: SystemCause,
        /// Generic user-facing failure text.
        message: String,
        /// Run summary.
        metadata: OutcomeMetadata,
    },
}

impl Outcome {
    /// Run summary, whatever the variant.
    pub fn metadata(&self) -> &OutcomeMetadata {
        match self {
            Self::Success { metadata, .. }
            | Self::Rejected { metadata, .. }
            | Self::SafeFallback { metadata, .. }
            | Self::SystemError { metadata, .. } => metadata,
        }
    }

    /// Correlation id of the run.
    pub fn correlation_id(&self) -> Uuid {
        self.metadata().correlation_id
    }

    /// Stable snake_case variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Rejected { .. } => "rejected",
            Self::SafeFallback { .. } => "safe_fallback",
            Self::SystemError { .. } => "system_error",
        }
    }

    /// Whether the run produced a verified response.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The text shown to the user.
    pub fn user_text(&self) -> &str {
        match self {
            Self::Success { response, .. } => response,
            Self::Rejected { message, .. }
            | Self::SafeFallback { message, .. }
            | Self::SystemError { message, .. } => message,
        }
    }

    /// Taxonomy bucket for non-success outcomes.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::Success { .. } => None,
            Self::Rejected { reason, .. } => Some(reason.class()),
            Self::SafeFallback { .. } => Some(FailureClass::SafetyExhausted),
            Self::SystemError { .. } => Some(FailureClass::CollaboratorError),
        }
    }

    /// Machine-readable reason for non-success outcomes.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Rejected { reason, .. } => Some(reason.as_str().to_string()),
            Self::SafeFallback { reason, .. } => Some(reason.clone()),
            Self::SystemError { cause, .. } => Some(cause.to_string()),
        }
    }

    /// Build the caller-facing envelope.
    ///
    /// Safe fallbacks count as successful deliveries (a safe answer was
    /// served). System errors hide their cause: only the category
    /// `system_error` is exposed, alongside the correlation id.
    pub fn to_response(&self) -> ApiResponse {
        let meta = self.metadata();
        let reason = match self {
            Self::SystemError { .. } => Some("system_error".to_string()),
            other => other.reason(),
        };
        ApiResponse {
            success: matches!(self, Self::Success { .. } | Self::SafeFallback { .. }),
            response: self.user_text().to_string(),
            correlation_id: meta.correlation_id,
            metadata: ResponseMetadata {
                attempts: meta.attempts,
                rejected_at: meta.rejected_at,
                verification: meta.verification,
                reason,
            },
        }
    }
}

// ── Envelope ────────────────────────────────────────────────────────────

/// The serializable response handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether a (verified or pre-approved) answer was served.
    pub success: bool,
    /// Response text, rejection message or fallback message.
    pub response: String,
    /// Correlation id for support requests.
    pub correlation_id: Uuid,
    /// Run summary.
    pub metadata: ResponseMetadata,
}

/// Metadata block of an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Number of generation attempts.
    pub attempts: u32,
    /// The gate that rejected the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<StageName>,
    /// Verification status.
    pub verification: VerificationStatus,
    /// Machine-readable reason for non-success outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> OutcomeMetadata {
        OutcomeMetadata::new(Uuid::nil())
    }

    #[test]
    fn reject_reason_taxonomy() {
        assert_eq!(RejectReason::InvalidInput.class(), FailureClass::InputError);
        assert_eq!(RejectReason::OffTopic.class(), FailureClass::PolicyError);
        assert_eq!(
            RejectReason::ModerationUnavailable.class(),
            FailureClass::CollaboratorError
        );
        assert!(FailureClass::PolicyError.user_correctable());
        assert!(!FailureClass::SafetyExhausted.user_correctable());
        assert_eq!(RejectReason::GenerationFailed.stage(), StageName::Generation);
    }

    #[test]
    fn system_cause_display() {
        assert_eq!(SystemCause::Cancelled.to_string(), "cancelled");
        assert_eq!(SystemCause::DeadlineExceeded.to_string(), "deadline_exceeded");
        let cause = SystemCause::Collaborator {
            stage: StageName::Moderation,
            detail: "operation timed out: moderation".into(),
        };
        assert_eq!(
            cause.to_string(),
            "moderation: operation timed out: moderation"
        );
    }

    #[test]
    fn success_envelope() {
        let mut m = meta();
        m.attempts = 1;
        m.verification = VerificationStatus::Passed;
        let outcome = Outcome::Success {
            response: "Kambo is a traditional ceremony.".into(),
            metadata: m,
        };
        let resp = outcome.to_response();
        assert!(resp.success);
        assert_eq!(resp.response, "Kambo is a traditional ceremony.");
        assert_eq!(resp.metadata.attempts, 1);
        assert!(resp.metadata.reason.is_none());
        assert!(outcome.failure_class().is_none());
    }

    #[test]
    fn system_error_envelope_hides_cause() {
        let outcome = Outcome::SystemError {
            cause: SystemCause::Collaborator {
                stage: StageName::Generation,
                detail: "provider error: secret upstream detail".into(),
            },
            message: "Something went wrong.".into(),
            metadata: meta(),
        };
        let resp = outcome.to_response();
        assert!(!resp.success);
        assert_eq!(resp.metadata.reason.as_deref(), Some("system_error"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("secret upstream detail"));
    }

    #[test]
    fn fallback_counts_as_delivered() {
        let outcome = Outcome::SafeFallback {
            reason: SAFETY_EXHAUSTED.into(),
            message: "Please consult a qualified provider.".into(),
            metadata: meta(),
        };
        assert!(outcome.to_response().success);
        assert_eq!(outcome.failure_class(), Some(FailureClass::SafetyExhausted));
        assert_eq!(outcome.kind(), "safe_fallback");
    }

    #[test]
    fn outcome_json_is_tagged() {
        let outcome = Outcome::Rejected {
            reason: RejectReason::OffTopic,
            message: "Ask about Kambo.".into(),
            metadata: meta(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["reason"], "off_topic");
        let restored: Outcome = serde_json::from_value(json).unwrap();
        assert_eq!(restored, outcome);
    }
}
