//! Per-run state, the stage result contract and the stage trace.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kambot_types::{RejectReason, Request, Snippet, StageName, Verdict, VerificationStatus};

// ── PipelineState ───────────────────────────────────────────────────────

/// Accumulator threaded through the stages of a single run.
///
/// A run owns exactly one lineage of states. Stages receive a shared
/// reference and hand back a fresh value inside [`StageResult::Continue`];
/// the `with_*` builders below consume `self`, so a stage always works on
/// its own clone.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// The inbound request, never modified.
    pub request: Request,
    /// Text after validation. `None` until the validation stage passes.
    pub sanitized_text: Option<String>,
    /// Moderation verdict.
    pub moderation: Option<Verdict>,
    /// Topic verdict.
    pub topic: Option<Verdict>,
    /// Retrieved reference snippets, in retriever order. Possibly empty.
    pub context: Vec<Snippet>,
    /// Set when retrieval failed and the run continued without context.
    pub context_warning: Option<String>,
    /// Latest candidate response.
    pub candidate: Option<String>,
    /// Verdict on the latest candidate.
    pub verification: Option<Verdict>,
    /// Number of candidates generated so far.
    pub attempts: u32,
    /// Verification feedback from every failed attempt, oldest first.
    pub feedback: Vec<String>,
}

impl PipelineState {
    /// Fresh state for a request entering the pipeline.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            sanitized_text: None,
            moderation: None,
            topic: None,
            context: Vec::new(),
            context_warning: None,
            candidate: None,
            verification: None,
            attempts: 0,
            feedback: Vec::new(),
        }
    }

    /// The text downstream stages operate on: sanitized when available,
    /// otherwise the raw request text.
    pub fn text(&self) -> &str {
        self.sanitized_text
            .as_deref()
            .unwrap_or_else(|| self.request.text())
    }

    pub fn with_sanitized_text(mut self, text: impl Into<String>) -> Self {
        self.sanitized_text = Some(text.into());
        self
    }

    pub fn with_moderation(mut self, verdict: Verdict) -> Self {
        self.moderation = Some(verdict);
        self
    }

    pub fn with_topic(mut self, verdict: Verdict) -> Self {
        self.topic = Some(verdict);
        self
    }

    pub fn with_context(mut self, context: Vec<Snippet>) -> Self {
        self.context = context;
        self
    }

    /// Record that retrieval failed; the context stays empty.
    pub fn with_context_warning(mut self, warning: impl Into<String>) -> Self {
        self.context.clear();
        self.context_warning = Some(warning.into());
        self
    }

    /// Store a freshly generated candidate and count the attempt.
    ///
    /// The previous verdict belongs to the previous candidate, so it is
    /// cleared.
    pub fn with_candidate(mut self, candidate: impl Into<String>) -> Self {
        self.candidate = Some(candidate.into());
        self.verification = None;
        self.attempts += 1;
        self
    }

    pub fn with_verification(mut self, verdict: Verdict) -> Self {
        self.verification = Some(verdict);
        self
    }

    /// Record a failed verification and keep its feedback for the next
    /// generation attempt.
    pub fn with_failed_verification(mut self, feedback: impl Into<String>) -> Self {
        let feedback = feedback.into();
        self.verification = Some(Verdict::fail(feedback.clone()));
        self.feedback.push(feedback);
        self
    }

    /// Verification status of the latest candidate.
    pub fn verification_status(&self) -> VerificationStatus {
        match &self.verification {
            None => VerificationStatus::NotRun,
            Some(v) if v.passed() => VerificationStatus::Passed,
            Some(_) => VerificationStatus::Failed,
        }
    }
}

// ── StageResult ─────────────────────────────────────────────────────────

/// What a stage tells the coordinator.
#[derive(Debug, Clone)]
pub enum StageResult {
    /// Proceed with the updated state.
    Continue(PipelineState),
    /// End the run.
    Reject {
        /// Gate and reason.
        reason: RejectReason,
        /// User-facing text.
        message: String,
        /// Diagnostic detail for the audit trail (collaborator error, matched
        /// screening checks). Never shown to the user.
        detail: Option<String>,
    },
    /// The candidate failed verification; try again with this feedback.
    Retry(String),
}

impl StageResult {
    pub fn reject(reason: RejectReason, message: impl Into<String>) -> Self {
        Self::Reject {
            reason,
            message: message.into(),
            detail: None,
        }
    }

    pub fn reject_with_detail(
        reason: RejectReason,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Reject {
            reason,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Short label used in logs and the trace.
    pub fn label(&self) -> TraceStatus {
        match self {
            Self::Continue(_) => TraceStatus::Continue,
            Self::Reject { .. } => TraceStatus::Reject,
            Self::Retry(_) => TraceStatus::Retry,
        }
    }
}

// ── Trace ───────────────────────────────────────────────────────────────

/// Result class of one traced stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Continue,
    Reject,
    Retry,
}

/// One stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: StageName,
    pub status: TraceStatus,
    /// Reject reason, retry feedback or degradation warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attempt counter after the stage ran.
    pub attempt: u32,
    pub elapsed_ms: u64,
}

/// Append-only record of the transitions of one run.
///
/// Lives outside the run future so the coordinator can still read it after
/// the run was cancelled, timed out or panicked.
#[derive(Debug, Default)]
pub struct StageTrace {
    entries: Mutex<Vec<TraceEntry>>,
}

impl StageTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition.
    pub fn push(
        &self,
        stage: StageName,
        result: &StageResult,
        attempt: u32,
        elapsed: Duration,
    ) {
        let detail = match result {
            StageResult::Continue(state) if stage == StageName::Context => {
                state.context_warning.clone()
            }
            StageResult::Continue(_) => None,
            StageResult::Reject { reason, detail, .. } => Some(match detail {
                Some(d) => format!("{reason}: {d}"),
                None => reason.to_string(),
            }),
            StageResult::Retry(feedback) => Some(feedback.clone()),
        };
        let entry = TraceEntry {
            stage,
            status: result.label(),
            detail,
            attempt,
            elapsed_ms: elapsed.as_millis() as u64,
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// Copy of the entries recorded so far.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Highest attempt counter observed.
    pub fn last_attempt(&self) -> u32 {
        self.entries().iter().map(|e| e.attempt).max().unwrap_or(0)
    }

    /// Number of verification retries observed.
    pub fn retry_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.status == TraceStatus::Retry)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PipelineState {
        PipelineState::new(Request::anonymous("  What is Kambo?  "))
    }

    #[test]
    fn text_prefers_sanitized() {
        let s = state();
        assert_eq!(s.text(), "  What is Kambo?  ");
        let s = s.with_sanitized_text("What is Kambo?");
        assert_eq!(s.text(), "What is Kambo?");
    }

    #[test]
    fn builders_leave_the_original_untouched() {
        let original = state();
        let next = original.clone().with_candidate("draft");
        assert_eq!(original.attempts, 0);
        assert!(original.candidate.is_none());
        assert_eq!(next.attempts, 1);
    }

    #[test]
    fn new_candidate_clears_previous_verdict() {
        let s = state()
            .with_candidate("first")
            .with_failed_verification("mentions dosage")
            .with_candidate("second");
        assert_eq!(s.verification_status(), VerificationStatus::NotRun);
        assert_eq!(s.feedback, vec!["mentions dosage".to_string()]);
        assert_eq!(s.attempts, 2);
    }

    #[test]
    fn context_warning_empties_context() {
        let s = state()
            .with_context(vec![Snippet::new("text", "src")])
            .with_context_warning("retriever down");
        assert!(s.context.is_empty());
        assert_eq!(s.context_warning.as_deref(), Some("retriever down"));
    }

    #[test]
    fn trace_records_details() {
        let trace = StageTrace::new();
        trace.push(
            StageName::Verification,
            &StageResult::Retry("contains 'dosage'".into()),
            1,
            Duration::from_millis(3),
        );
        trace.push(
            StageName::Moderation,
            &StageResult::reject_with_detail(
                RejectReason::ModerationUnavailable,
                "sorry",
                "timeout",
            ),
            1,
            Duration::ZERO,
        );
        let entries = trace.entries();
        assert_eq!(entries[0].status, TraceStatus::Retry);
        assert_eq!(entries[0].detail.as_deref(), Some("contains 'dosage'"));
        assert_eq!(
            entries[1].detail.as_deref(),
            Some("moderation_unavailable: timeout")
        );
        assert_eq!(trace.retry_count(), 1);
        assert_eq!(trace.last_attempt(), 1);
    }
}
