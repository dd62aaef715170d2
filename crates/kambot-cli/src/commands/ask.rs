//! `kambot ask` -- run one question through the pipeline.
//!
//! # Examples
//!
//! ```text
//! kambot ask "What is a Kambo ceremony?" --offline
//! kambot ask "What is the history of Kambo?" --json
//! ```

use clap::Args;

use kambot_core::build_coordinator;
use kambot_types::Request;

use super::{load_config, print_outcome, run_cancellable};

/// Arguments for the `kambot ask` subcommand.
#[derive(Args)]
pub struct AskArgs {
    /// The question to ask.
    pub question: String,

    /// Use local collaborators only (no LLM provider, no API key).
    #[arg(long)]
    pub offline: bool,

    /// Print the response envelope as JSON.
    #[arg(long)]
    pub json: bool,

    /// Requester id recorded in the audit trail.
    #[arg(long)]
    pub user: Option<String>,

    /// Conversation id recorded in the audit trail.
    #[arg(long)]
    pub conversation: Option<String>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let coordinator = build_coordinator(&config, args.offline)?;

    let mut request = match args.user {
        Some(user) => Request::new(args.question, user),
        None => Request::anonymous(args.question),
    };
    if let Some(conversation) = args.conversation {
        request = request.with_conversation(conversation);
    }
    let outcome = run_cancellable(&coordinator, request).await;
    print_outcome(&outcome, args.json)?;
    coordinator.flush_audit().await;
    Ok(())
}
