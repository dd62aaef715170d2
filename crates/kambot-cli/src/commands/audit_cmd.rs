//! `kambot audit` -- inspect the JSONL audit trail.

use kambot_core::{AuditRecord, JsonlAuditSink};
use kambot_types::config::Config;

/// Print the last `limit` records of the configured audit file.
pub async fn audit_tail(config: &Config, limit: usize, json: bool) -> anyhow::Result<()> {
    if !config.audit.enabled {
        eprintln!("note: audit file is disabled; runs are only logged");
    }
    let path = config.audit.resolved_path();
    let records = JsonlAuditSink::tail(&path, limit).await?;
    if records.is_empty() {
        println!("no audit records in {}", path.display());
        return Ok(());
    }

    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{}", summary_line(record));
        }
    }
    Ok(())
}

fn summary_line(record: &AuditRecord) -> String {
    let mut line = format!(
        "{} {} {:<13} attempts={}",
        record.completed_at.format("%Y-%m-%d %H:%M:%S"),
        record.run_id,
        record.outcome,
        record.attempts
    );
    if let Some(reason) = &record.reason {
        line.push_str(&format!(" reason={reason}"));
    }
    line
}
