//! relab CLI - Main entry point

mod cli;
mod display;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relab_foundation::RelabConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// relab - tool-using research agent for the terminal
#[derive(Parser, Debug)]
#[command(name = "relab")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Load this config file instead of the global + project files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model to use
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a task
    Run {
        /// Task description
        task: String,

        /// File whose content is passed as context
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Iteration budget (default from config)
        #[arg(long, conflicts_with = "unbounded")]
        max_iterations: Option<usize>,

        /// No iteration budget; stop with Ctrl-C
        #[arg(long)]
        unbounded: bool,

        /// Do not record a session file
        #[arg(long)]
        no_session: bool,
    },
    /// Continue a paused session
    Resume {
        /// Session ID
        session_id: String,

        /// Extra instruction appended before continuing
        #[arg(long)]
        note: Option<String>,

        /// Iteration budget for this continuation
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// List recorded sessions
    Sessions {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the available tools
    Tools,
}

fn load_config(args: &Args) -> anyhow::Result<RelabConfig> {
    let mut config = match &args.config {
        Some(path) => RelabConfig::load_from(path)?,
        None => RelabConfig::load()?,
    };
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url.clone());
    }
    Ok(config)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&args)?;

    match args.command {
        Command::Run {
            task,
            context_file,
            max_iterations,
            unbounded,
            no_session,
        } => {
            let context = match context_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let max_iterations = if unbounded {
                usize::MAX
            } else {
                max_iterations.unwrap_or(config.agent.max_iterations)
            };

            let result = cli::run_task(
                &config,
                cli::RunOptions {
                    task,
                    context,
                    max_iterations,
                    record: !no_session,
                },
            )
            .await?;
            Ok(exit_code(result.success))
        }
        Command::Resume {
            session_id,
            note,
            max_iterations,
        } => {
            let result = cli::resume_session(&config, &session_id, note, max_iterations).await?;
            Ok(exit_code(result.success))
        }
        Command::Sessions { limit } => {
            cli::list_sessions(&config, limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Tools => {
            cli::list_tools(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
