//! `kambot chat` -- interactive question loop.
//!
//! Every line is an independent pipeline run. Runs in one session share a
//! conversation id so their audit records can be grouped. Ctrl-C cancels
//! the run in flight; at the prompt it leaves the loop, as do `/exit` and
//! EOF.

use std::future::Future;
use std::io::Write;

use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use uuid::Uuid;

use kambot_core::build_coordinator;
use kambot_types::Request;

use super::{load_config, print_outcome, run_cancellable};

/// Arguments for the `kambot chat` subcommand.
#[derive(Args)]
pub struct ChatArgs {
    /// Use local collaborators only (no LLM provider, no API key).
    #[arg(long)]
    pub offline: bool,

    /// Requester id recorded in the audit trail.
    #[arg(long, default_value = "local")]
    pub user: String,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// What happened while waiting at the prompt.
#[derive(Debug, PartialEq)]
enum PromptEvent {
    Line(String),
    Eof,
    Interrupted,
}

/// Wait for the next input line or for `interrupt`, whichever comes first.
async fn next_event<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<PromptEvent>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => PromptEvent::Line(line),
            None => PromptEvent::Eof,
        }),
        () = interrupt => Ok(PromptEvent::Interrupted),
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available: only /exit and EOF end the session.
        std::future::pending::<()>().await;
    }
}

pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let coordinator = build_coordinator(&config, args.offline)?;
    let conversation = Uuid::new_v4().to_string();

    println!("kambot -- ask about Kambo ceremonies (type /help for commands)");
    if args.offline {
        println!("Mode: offline");
    } else {
        println!("Model: {}", config.provider.model);
    }
    println!();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let line = match next_event(&mut lines, ctrl_c()).await? {
            PromptEvent::Line(line) => line,
            PromptEvent::Eof => break,
            PromptEvent::Interrupted => {
                eprintln!();
                break;
            }
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        let request =
            Request::new(input, args.user.as_str()).with_conversation(conversation.as_str());
        let outcome = run_cancellable(&coordinator, request).await;
        print_outcome(&outcome, false)?;
        println!();
    }

    coordinator.flush_audit().await;
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /help   Show this help");
    println!("  /exit   Leave the session (Ctrl-C at the prompt does the same)");
    println!();
    println!("Press Ctrl-C to cancel a question that is taking too long.");
    println!();
}
