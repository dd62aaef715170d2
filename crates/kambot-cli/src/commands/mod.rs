//! CLI command implementations for `kambot`.
//!
//! - [`ask`] -- One question, one outcome.
//! - [`chat`] -- Interactive loop over the same coordinator.
//! - [`config_cmd`] -- Configuration display and validation.
//! - [`audit_cmd`] -- Audit trail inspection.

pub mod ask;
pub mod audit_cmd;
pub mod chat;
pub mod config_cmd;

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use kambot_core::Coordinator;
use kambot_types::config::Config;
use kambot_types::{Outcome, Request};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "KAMBOT_CONFIG";

/// Load configuration from the given path override or via auto-discovery.
///
/// Without an override the discovery chain is:
/// 1. `KAMBOT_CONFIG` env var
/// 2. `~/.kambot/config.json`
///
/// Returns a default `Config` if no config file is found.
pub fn load_config(config_override: Option<&str>) -> anyhow::Result<Config> {
    load_config_with_source(config_override).map(|(config, _)| config)
}

/// Like [`load_config`], also returning the file the config came from
/// (`None` when defaults were used).
pub fn load_config_with_source(
    config_override: Option<&str>,
) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = match config_override {
        Some(raw) => {
            let path = PathBuf::from(raw);
            if !path.exists() {
                anyhow::bail!("config file not found: {raw}");
            }
            Some(path)
        }
        None => discover_config_path(),
    };

    match path {
        Some(path) => Ok((read_config(&path)?, Some(path))),
        None => {
            debug!("no config file found, using defaults");
            Ok((Config::default(), None))
        }
    }
}

/// First existing config file in the discovery chain.
pub fn discover_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(raw);
        if path.exists() {
            return Some(path);
        }
    }
    let default = dirs::home_dir()?.join(".kambot").join("config.json");
    default.exists().then_some(default)
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    let config: Config = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Run one request, cancelling it if Ctrl-C arrives first.
pub async fn run_cancellable(coordinator: &Coordinator, request: Request) -> Outcome {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let outcome = coordinator.handle_with_cancel(request, cancel).await;
    watcher.abort();
    outcome
}

/// Print an outcome for a terminal reader.
pub fn print_outcome(outcome: &Outcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.to_response())?);
        return Ok(());
    }
    println!("{}", outcome.user_text());
    let meta = outcome.metadata();
    eprintln!(
        "[{} | attempts: {} | ref: {}]",
        outcome.kind(),
        meta.attempts,
        meta.correlation_id
    );
    Ok(())
}
