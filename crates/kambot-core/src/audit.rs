//! Audit trail.
//!
//! One [`AuditRecord`] is written per run, after the outcome is decided.
//! Records carry the stage trace, the outcome class and the full failure
//! cause; they never carry candidate response texts.
//!
//! The coordinator does not wait on the sink. Records go through an
//! [`AuditQueue`] to a single background writer, so a slow or broken sink
//! never delays or changes an outcome.
//!
//! Sinks:
//!
//! - [`JsonlAuditSink`] -- appends one JSON line per run to a file
//! - [`TracingAuditSink`] -- emits the record as a structured log event
//! - [`MemoryAuditSink`] -- keeps records in memory for inspection

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kambot_types::{FailureClass, Outcome, Request, Result, StageName, VerificationStatus};

use crate::pipeline::bounded;
use crate::pipeline::coordinator::panic_detail;
use crate::pipeline::state::TraceEntry;
use crate::pipeline::traits::AuditSink;

/// What the audit trail keeps about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: Uuid,
    pub requester_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// `success`, `rejected`, `safe_fallback` or `system_error`.
    pub outcome: String,
    /// Reject reason, fallback reason or full system-error cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_class: Option<FailureClass>,
    pub attempts: u32,
    pub feedback_count: usize,
    pub context_snippets: usize,
    pub verification: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<StageName>,
    pub trace: Vec<TraceEntry>,
}

impl AuditRecord {
    /// Summarize a finished run.
    pub fn from_run(request: &Request, outcome: &Outcome, trace: Vec<TraceEntry>) -> Self {
        let meta = outcome.metadata();
        Self {
            run_id: meta.correlation_id,
            requester_id: request.requester_id().to_string(),
            conversation_id: request.conversation_id().map(String::from),
            received_at: request.received_at(),
            completed_at: Utc::now(),
            outcome: outcome.kind().to_string(),
            reason: outcome.reason(),
            failure_class: outcome.failure_class(),
            attempts: meta.attempts,
            feedback_count: meta.feedback_count,
            context_snippets: meta.context_snippets,
            verification: meta.verification,
            rejected_at: meta.rejected_at,
            trace,
        }
    }
}

// ── Background writer ───────────────────────────────────────────────────

enum AuditJob {
    Record(Box<AuditRecord>),
    Flush(oneshot::Sender<()>),
}

/// Hands records to one background task that writes them in submission
/// order.
///
/// The task starts on the first submission, on the runtime that is running
/// the pipeline, and exits after the queue is dropped and drained. Each
/// write is bounded by `write_timeout`; errors and panics are logged.
pub struct AuditQueue {
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
    jobs: OnceLock<mpsc::UnboundedSender<AuditJob>>,
}

impl AuditQueue {
    pub fn new(sink: Arc<dyn AuditSink>, write_timeout: Duration) -> Self {
        Self {
            sink,
            write_timeout,
            jobs: OnceLock::new(),
        }
    }

    fn sender(&self) -> &mpsc::UnboundedSender<AuditJob> {
        self.jobs.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(drain(self.sink.clone(), self.write_timeout, rx));
            tx
        })
    }

    /// Queue a record. Returns immediately.
    pub fn submit(&self, record: AuditRecord) {
        let run_id = record.run_id;
        if self.sender().send(AuditJob::Record(Box::new(record))).is_err() {
            warn!(run_id = %run_id, "audit writer stopped, record dropped");
        }
    }

    /// Wait until every record submitted before this call was handed to the
    /// sink (or given up on).
    pub async fn flush(&self) {
        let Some(jobs) = self.jobs.get() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if jobs.send(AuditJob::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn drain(
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
    mut jobs: mpsc::UnboundedReceiver<AuditJob>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            AuditJob::Record(record) => write_one(sink.as_ref(), write_timeout, &record).await,
            AuditJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("audit writer finished");
}

async fn write_one(sink: &dyn AuditSink, limit: Duration, record: &AuditRecord) {
    let write = bounded("audit.record", limit, sink.record(record));
    match AssertUnwindSafe(write).catch_unwind().await {
        Ok(Ok(())) => debug!(run_id = %record.run_id, "audit recorded"),
        Ok(Err(e)) => warn!(run_id = %record.run_id, error = %e, "audit sink failed"),
        Err(panic) => warn!(
            run_id = %record.run_id,
            detail = %panic_detail(panic.as_ref()),
            "audit sink panicked"
        ),
    }
}

// ── JSONL ───────────────────────────────────────────────────────────────

/// Appends records to a JSONL file, one object per line.
///
/// Writes from concurrent runs are serialized so lines never interleave.
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last `n` records from a JSONL audit file.
    ///
    /// A missing file yields no records. Lines that do not parse are
    /// skipped.
    pub async fn tail(path: &Path, n: usize) -> Result<Vec<AuditRecord>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<AuditRecord> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), run_id = %record.run_id, "audit record appended");
        Ok(())
    }
}

// ── Tracing ─────────────────────────────────────────────────────────────

/// Emits each record as an `info` event on the `kambot::audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        info!(
            target: "kambot::audit",
            run_id = %record.run_id,
            requester = %record.requester_id,
            outcome = %record.outcome,
            reason = record.reason.as_deref().unwrap_or(""),
            attempts = record.attempts,
            stages = record.trace.len(),
            "run audited"
        );
        Ok(())
    }
}

// ── Memory ──────────────────────────────────────────────────────────────

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: StdMutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
