//! Pipeline coordinator.
//!
//! The [`Coordinator`] is built once per process from injected
//! collaborators and shared by every run. It holds no per-run mutable
//! state: each call to [`Coordinator::handle`] creates its own
//! [`PipelineState`] and [`StageTrace`].
//!
//! Per run it:
//!
//! 1. runs the gate stages in order, stopping at the first rejection,
//! 2. hands the surviving state to the [`RetryController`],
//! 3. turns the settled run into exactly one [`Outcome`],
//! 4. queues that outcome for the audit sink and returns it without
//!    waiting for the write.
//!
//! The whole run is raced against the caller's [`CancellationToken`] and
//! the configured deadline. Losing the race drops the run future, which
//! cancels whatever collaborator call was in flight. A panic anywhere in
//! the run becomes a `SystemError`; nothing escapes to the caller.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use kambot_types::config::{Config, MessagesConfig};
use kambot_types::{
    FailureClass, Outcome, OutcomeMetadata, Request, SAFETY_EXHAUSTED, StageName, SystemCause,
};

use super::context::ContextStage;
use super::generation::GenerationStage;
use super::moderation::ModerationStage;
use super::retry::{RetryController, Settled};
use super::state::{PipelineState, StageResult, StageTrace};
use super::topic::TopicStage;
use super::execute;
use super::traits::{Collaborators, Stage};
use super::validation::ValidationStage;
use super::verification::VerificationStage;
use crate::audit::{AuditQueue, AuditRecord};

/// How a run ended before it became an outcome.
enum RunEnd {
    Settled(Settled),
    Aborted(SystemCause),
}

/// Sequences the stages of every run and produces its outcome.
pub struct Coordinator {
    gates: Vec<Box<dyn Stage>>,
    retry: RetryController,
    audit: AuditQueue,
    messages: MessagesConfig,
    run_deadline: Duration,
}

impl Coordinator {
    /// Build a coordinator from collaborators and configuration.
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        let p = &config.pipeline;
        let m = &config.messages;
        let timeout = Duration::from_millis(p.collaborator_timeout_ms);

        let gates: Vec<Box<dyn Stage>> = vec![
            Box::new(ValidationStage::new(p.max_input_length, &m.invalid_input)),
            Box::new(ModerationStage::new(
                collaborators.moderation,
                timeout,
                &m.policy_refusal,
                &m.system_error,
            )),
            Box::new(TopicStage::new(
                collaborators.topic,
                timeout,
                &m.off_topic,
                &m.system_error,
            )),
            Box::new(ContextStage::new(collaborators.retriever, timeout)),
        ];

        let retry = RetryController::new(
            GenerationStage::new(collaborators.generator, timeout, &m.system_error),
            VerificationStage::new(collaborators.verifier, timeout, &m.system_error),
            p.max_attempts,
        );

        Self {
            gates,
            retry,
            audit: AuditQueue::new(collaborators.audit, timeout),
            messages: m.clone(),
            run_deadline: Duration::from_millis(p.run_deadline_ms),
        }
    }

    /// The retry budget in force.
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    /// Wait for audit records of finished runs to reach the sink.
    ///
    /// Call before shutting down so queued records are not lost.
    pub async fn flush_audit(&self) {
        self.audit.flush().await;
    }

    /// Process one request to its outcome.
    pub async fn handle(&self, request: Request) -> Outcome {
        self.handle_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Process one request, abandoning it when `cancel` fires.
    ///
    /// A cancelled run still yields (and audits) an outcome:
    /// `SystemError("cancelled")`.
    pub async fn handle_with_cancel(&self, request: Request, cancel: CancellationToken) -> Outcome {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            requester = %request.requester_id()
        );
        self.drive(run_id, request, cancel).instrument(span).await
    }

    async fn drive(&self, run_id: Uuid, request: Request, cancel: CancellationToken) -> Outcome {
        let trace = StageTrace::new();
        let run = AssertUnwindSafe(self.run(&request, &trace)).catch_unwind();

        let end = tokio::select! {
            biased;
            _ = cancel.cancelled() => RunEnd::Aborted(SystemCause::Cancelled),
            result = tokio::time::timeout(self.run_deadline, run) => match result {
                Err(_) => RunEnd::Aborted(SystemCause::DeadlineExceeded),
                Ok(Err(panic)) => {
                    let detail = panic_detail(panic.as_ref());
                    error!(detail = %detail, "pipeline run panicked");
                    RunEnd::Aborted(SystemCause::Internal { detail })
                }
                Ok(Ok(end)) => end,
            },
        };

        let outcome = self.conclude(run_id, end, &trace);
        let reason = outcome.reason();
        info!(
            outcome = outcome.kind(),
            reason = reason.as_deref().unwrap_or(""),
            attempts = outcome.metadata().attempts,
            "run finished"
        );

        self.audit
            .submit(AuditRecord::from_run(&request, &outcome, trace.entries()));
        outcome
    }

    async fn run(&self, request: &Request, trace: &StageTrace) -> RunEnd {
        let mut state = PipelineState::new(request.clone());

        for gate in &self.gates {
            match execute(gate.as_ref(), &state, trace).await {
                StageResult::Continue(next) => state = next,
                StageResult::Reject {
                    reason,
                    message,
                    detail,
                } => {
                    return RunEnd::Settled(Settled::Rejected {
                        state,
                        reason,
                        message,
                        detail,
                    });
                }
                StageResult::Retry(_) => {
                    return RunEnd::Aborted(SystemCause::Internal {
                        detail: format!("{} stage asked for a retry", gate.name()),
                    });
                }
            }
        }

        RunEnd::Settled(self.retry.run(state, trace).await)
    }

    fn conclude(&self, run_id: Uuid, end: RunEnd, trace: &StageTrace) -> Outcome {
        match end {
            RunEnd::Settled(Settled::Passed(state)) => {
                let metadata = metadata_from(run_id, &state, None);
                match state.candidate {
                    Some(response) => Outcome::Success { response, metadata },
                    None => self.system_error(
                        SystemCause::Internal {
                            detail: "verified run has no candidate".into(),
                        },
                        metadata,
                    ),
                }
            }
            RunEnd::Settled(Settled::Exhausted(state)) => Outcome::SafeFallback {
                reason: SAFETY_EXHAUSTED.into(),
                message: self.messages.safe_fallback.clone(),
                metadata: metadata_from(run_id, &state, None),
            },
            RunEnd::Settled(Settled::Rejected {
                state,
                reason,
                message,
                detail,
            }) => {
                let stage = reason.stage();
                let metadata = metadata_from(run_id, &state, Some(stage));
                if reason.class() == FailureClass::CollaboratorError {
                    let detail = match detail {
                        Some(d) => format!("{reason}: {d}"),
                        None => reason.to_string(),
                    };
                    self.system_error(SystemCause::Collaborator { stage, detail }, metadata)
                } else {
                    Outcome::Rejected {
                        reason,
                        message,
                        metadata,
                    }
                }
            }
            RunEnd::Aborted(cause) => {
                let mut metadata = OutcomeMetadata::new(run_id);
                metadata.attempts = trace.last_attempt();
                metadata.feedback_count = trace.retry_count();
                self.system_error(cause, metadata)
            }
        }
    }

    fn system_error(&self, cause: SystemCause, metadata: OutcomeMetadata) -> Outcome {
        let message = format!(
            "{} (reference: {})",
            self.messages.system_error, metadata.correlation_id
        );
        Outcome::SystemError {
            cause,
            message,
            metadata,
        }
    }
}

fn metadata_from(
    run_id: Uuid,
    state: &PipelineState,
    rejected_at: Option<StageName>,
) -> OutcomeMetadata {
    OutcomeMetadata {
        correlation_id: run_id,
        attempts: state.attempts,
        rejected_at,
        verification: state.verification_status(),
        feedback_count: state.feedback.len(),
        context_snippets: state.context.len(),
        topic_confidence: state.topic.as_ref().and_then(|v| v.confidence()),
    }
}

pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".into()
    }
}
