//! `kambot`: ask questions about Kambo through the safety pipeline.
//!
//! Logs go to stderr so `ask --json` output stays machine-readable.
//! `RUST_LOG` overrides the default level.

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kambot", about = "Kambo educational assistant", version)]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the outcome.
    Ask(commands::ask::AskArgs),

    /// Interactive question loop.
    Chat(commands::chat::ChatArgs),

    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },

    /// Read the audit trail.
    Audit {
        #[command(subcommand)]
        action: AuditCmd,
    },
}

// `-c/--config` for subcommands that only read config.
#[derive(Args)]
struct ConfigPath {
    /// Config file (default: $KAMBOT_CONFIG, then ~/.kambot/config.json).
    #[arg(short, long)]
    config: Option<String>,
}

impl ConfigPath {
    fn load(&self) -> anyhow::Result<kambot_types::config::Config> {
        commands::load_config(self.config.as_deref())
    }
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Whole config as JSON.
    Show(ConfigPath),

    /// One section (pipeline, messages, provider, knowledge, audit).
    Section {
        name: String,
        #[command(flatten)]
        path: ConfigPath,
    },

    /// Run the semantic checks.
    Validate(ConfigPath),
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Most recent records, oldest first.
    Tail {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Raw JSON lines instead of summaries.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        path: ConfigPath,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask(args) => commands::ask::run(args).await,
        Commands::Chat(args) => commands::chat::run(args).await,
        Commands::Config { action } => match action {
            ConfigCmd::Show(path) => {
                commands::config_cmd::config_show(&path.load()?);
                Ok(())
            }
            ConfigCmd::Section { name, path } => {
                commands::config_cmd::config_section(&path.load()?, &name);
                Ok(())
            }
            ConfigCmd::Validate(path) => {
                let (cfg, source) = commands::load_config_with_source(path.config.as_deref())?;
                commands::config_cmd::config_validate(&cfg, source.as_deref())
            }
        },
        Commands::Audit {
            action: AuditCmd::Tail { limit, json, path },
        } => commands::audit_cmd::audit_tail(&path.load()?, limit, json).await,
    }
}
