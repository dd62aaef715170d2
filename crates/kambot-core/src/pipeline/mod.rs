//! The request orchestration pipeline.
//!
//! ```text
//! Coordinator
//!   -> validation -> moderation -> topic -> context
//!   -> RetryController [ generation <-> verification ] x max_attempts
//!   -> Outcome -> AuditSink
//! ```
//!
//! Every gate can short-circuit the run. Only the retry controller may run
//! a stage more than once, and only after a failed verification.

pub mod context;
pub mod coordinator;
pub mod generation;
pub mod moderation;
pub mod retry;
pub mod state;
pub mod topic;
pub mod traits;
pub mod validation;
pub mod verification;

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use kambot_types::{KambotError, Result};

use self::state::{PipelineState, StageResult, StageTrace};
use self::traits::Stage;

/// Await a collaborator call, failing with [`KambotError::Timeout`] once
/// `limit` elapses. The in-flight call is dropped on timeout.
pub(crate) async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(KambotError::timeout(operation)),
    }
}

/// Run one stage and record the transition.
pub(crate) async fn execute(
    stage: &dyn Stage,
    state: &PipelineState,
    trace: &StageTrace,
) -> StageResult {
    let started = Instant::now();
    let result = stage.run(state).await;
    let attempt = match &result {
        StageResult::Continue(next) => next.attempts,
        _ => state.attempts,
    };
    debug!(
        stage = %stage.name(),
        result = ?result.label(),
        attempt,
        "stage finished"
    );
    trace.push(stage.name(), &result, attempt, started.elapsed());
    result
}
