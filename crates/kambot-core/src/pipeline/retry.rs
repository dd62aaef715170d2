//! Retry controller: the generation/verification feedback loop.
//!
//! ```text
//! Attempting(n) --verify ok-------------------------> Passed
//! Attempting(n) --verify failed, n+1 < max----------> Attempting(n+1)
//! Attempting(n) --verify failed, n+1 == max---------> Exhausted
//! Attempting(n) --collaborator failure--------------> (terminal rejection)
//! ```
//!
//! Only a failed verification triggers another attempt. Generation and
//! verification collaborator failures end the loop at once and consume no
//! budget.

use tracing::{debug, info};

use kambot_types::RejectReason;

use super::execute;
use super::generation::GenerationStage;
use super::state::{PipelineState, StageResult, StageTrace};
use super::verification::VerificationStage;

/// Position of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to run attempt `n` (0-based).
    Attempting(u32),
    /// A candidate passed verification.
    Passed,
    /// Every attempt failed verification.
    Exhausted,
}

impl RetryState {
    /// Next state after attempt `n` was verified.
    pub fn after_verification(n: u32, passed: bool, max_attempts: u32) -> Self {
        if passed {
            Self::Passed
        } else if n + 1 < max_attempts {
            Self::Attempting(n + 1)
        } else {
            Self::Exhausted
        }
    }
}

/// How a run settled, before the coordinator turns it into an outcome.
///
/// Gate rejections use [`Settled::Rejected`] too.
#[derive(Debug)]
pub enum Settled {
    /// `state.candidate` passed verification.
    Passed(PipelineState),
    /// The budget is spent. The state carries every feedback string.
    Exhausted(PipelineState),
    /// A stage rejected the run.
    Rejected {
        state: PipelineState,
        reason: RejectReason,
        message: String,
        detail: Option<String>,
    },
}

pub struct RetryController {
    generation: GenerationStage,
    verification: VerificationStage,
    max_attempts: u32,
}

impl RetryController {
    /// A zero budget is raised to one attempt.
    pub fn new(
        generation: GenerationStage,
        verification: VerificationStage,
        max_attempts: u32,
    ) -> Self {
        Self {
            generation,
            verification,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive the loop from a state that has passed the context stage.
    pub async fn run(&self, state: PipelineState, trace: &StageTrace) -> Settled {
        let mut state = state;
        let mut position = RetryState::Attempting(0);

        loop {
            let n = match position {
                RetryState::Attempting(n) => n,
                RetryState::Passed => {
                    debug!(attempts = state.attempts, "verification passed");
                    return Settled::Passed(state);
                }
                RetryState::Exhausted => {
                    info!(attempts = state.attempts, "retry budget exhausted");
                    return Settled::Exhausted(state);
                }
            };

            let generated = match execute(&self.generation, &state, trace).await {
                StageResult::Continue(next) => next,
                StageResult::Reject {
                    reason,
                    message,
                    detail,
                } => {
                    return Settled::Rejected {
                        state,
                        reason,
                        message,
                        detail,
                    };
                }
                StageResult::Retry(_) => {
                    return Settled::Rejected {
                        state,
                        reason: RejectReason::GenerationFailed,
                        message: String::new(),
                        detail: Some("generation stage asked for a retry".into()),
                    };
                }
            };

            match execute(&self.verification, &generated, trace).await {
                StageResult::Continue(verified) => {
                    state = verified;
                    position = RetryState::after_verification(n, true, self.max_attempts);
                }
                StageResult::Retry(feedback) => {
                    state = generated.with_failed_verification(feedback);
                    position = RetryState::after_verification(n, false, self.max_attempts);
                }
                StageResult::Reject {
                    reason,
                    message,
                    detail,
                } => {
                    return Settled::Rejected {
                        state: generated,
                        reason,
                        message,
                        detail,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::traits::{ResponseGenerator, SafetyVerifier};
    use kambot_types::{KambotError, Request, Result, Snippet, Verdict, VerificationStatus};

    #[test]
    fn transitions() {
        assert_eq!(RetryState::after_verification(0, true, 3), RetryState::Passed);
        assert_eq!(
            RetryState::after_verification(0, false, 3),
            RetryState::Attempting(1)
        );
        assert_eq!(
            RetryState::after_verification(1, false, 3),
            RetryState::Attempting(2)
        );
        assert_eq!(RetryState::after_verification(2, false, 3), RetryState::Exhausted);
        assert_eq!(RetryState::after_verification(0, false, 1), RetryState::Exhausted);
    }

    struct Numbered {
        calls: AtomicU32,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl ResponseGenerator for Numbered {
        async fn generate(&self, _: &str, _: &[Snippet], _: &[String]) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(n) {
                return Err(KambotError::timeout("generation.generate"));
            }
            Ok(format!("candidate {n}"))
        }
    }

    /// Replays scripted verdicts; passes once the script runs out.
    struct Scripted(Mutex<VecDeque<bool>>);

    #[async_trait]
    impl SafetyVerifier for Scripted {
        async fn verify(&self, candidate: &str) -> Result<Verdict> {
            let passed = self.0.lock().unwrap().pop_front().unwrap_or(true);
            Ok(if passed {
                Verdict::pass()
            } else {
                Verdict::fail(format!("'{candidate}' gives advice"))
            })
        }
    }

    fn controller(verdicts: &[bool], fail_on: Option<u32>) -> (RetryController, Arc<Numbered>) {
        let generator = Arc::new(Numbered {
            calls: AtomicU32::new(0),
            fail_on,
        });
        let verifier = Arc::new(Scripted(Mutex::new(verdicts.iter().copied().collect())));
        let timeout = Duration::from_secs(1);
        let controller = RetryController::new(
            GenerationStage::new(generator.clone(), timeout, "err"),
            VerificationStage::new(verifier, timeout, "err"),
            3,
        );
        (controller, generator)
    }

    fn start() -> PipelineState {
        PipelineState::new(Request::anonymous("q")).with_sanitized_text("q")
    }

    #[tokio::test]
    async fn passes_on_third_attempt() {
        let (controller, generator) = controller(&[false, false, true], None);
        let trace = StageTrace::new();
        match controller.run(start(), &trace).await {
            Settled::Passed(state) => {
                assert_eq!(state.attempts, 3);
                assert_eq!(state.candidate.as_deref(), Some("candidate 2"));
                assert_eq!(state.feedback.len(), 2);
                assert_eq!(state.verification_status(), VerificationStatus::Passed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(trace.entries().len(), 6);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let (controller, generator) = controller(&[false, false, false, true], None);
        let trace = StageTrace::new();
        match controller.run(start(), &trace).await {
            Settled::Exhausted(state) => {
                assert_eq!(state.attempts, 3);
                assert_eq!(state.feedback.len(), 3);
                assert_eq!(state.verification_status(), VerificationStatus::Failed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(trace.retry_count(), 3);
    }

    #[tokio::test]
    async fn generation_failure_stops_the_loop() {
        let (controller, generator) = controller(&[false], Some(1));
        let trace = StageTrace::new();
        match controller.run(start(), &trace).await {
            Settled::Rejected { state, reason, .. } => {
                assert_eq!(reason, RejectReason::GenerationFailed);
                assert_eq!(state.attempts, 1);
                assert_eq!(state.feedback.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
