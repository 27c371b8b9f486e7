//! sqlflow CLI entry point.
//!
//! Binary name: `sqlflow`
//!
//! Parses CLI arguments, initializes tracing and the checkpoint database,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use sqlflow_observe::tracing_setup::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let default_level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,sqlflow_core=debug,sqlflow_infra=debug",
        _ => "trace",
    };
    init_tracing(TracingOptions {
        default_level,
        format: if cli.log_json { LogFormat::Json } else { LogFormat::Text },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Start {
            question,
            client,
            databases,
            email,
            thread,
        } => {
            let args = cli::run::StartArgs {
                question,
                client,
                databases,
                email,
                thread,
            };
            cli::run::start(&state, args, cli.json, cli.quiet).await?;
        }

        Commands::Resume { thread, feedback } => {
            cli::run::resume(&state, &thread, feedback, cli.json, cli.quiet).await?;
        }

        Commands::State { thread } => {
            cli::inspect::show_state(&state, &thread, cli.json).await?;
        }

        Commands::History { thread, limit } => {
            cli::inspect::show_history(&state, &thread, limit, cli.json).await?;
        }

        Commands::Pending { thread } => {
            cli::inspect::show_pending(&state, &thread, cli.json).await?;
        }

        Commands::Suspended => {
            cli::inspect::list_suspended(&state, cli.json).await?;
        }

        Commands::Config => {
            cli::inspect::show_config(&state, cli.json)?;
        }
    }

    Ok(())
}
