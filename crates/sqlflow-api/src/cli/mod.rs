//! CLI command definitions for the `sqlflow` binary.
//!
//! `start` and `resume` drive the workflow; the remaining commands only read
//! checkpoints and config.

pub mod inspect;
pub mod render;
pub mod run;

use clap::{Parser, Subcommand};

/// Turn natural-language questions into validated SQL and chart recommendations.
#[derive(Parser)]
#[command(name = "sqlflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "SQLFLOW_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question and run the workflow until it needs feedback.
    Start {
        /// The question, e.g. "total sales by month".
        question: String,

        /// Client name used to locate schema collections and databases.
        #[arg(long, env = "SQLFLOW_CLIENT")]
        client: String,

        /// Database to query (repeatable; the first one is used).
        #[arg(long = "database", short = 'd', required = true)]
        databases: Vec<String>,

        /// Email of the person asking.
        #[arg(long)]
        email: Option<String>,

        /// Thread id to use (defaults to a new UUID).
        #[arg(long)]
        thread: Option<String>,
    },

    /// Continue a suspended or interrupted run.
    Resume {
        /// Thread id of the run.
        thread: String,

        /// Feedback on the recommended chart, e.g. "show it as a pie chart".
        #[arg(long, short = 'f')]
        feedback: Option<String>,
    },

    /// Show the latest checkpoint of a run.
    State {
        /// Thread id of the run.
        thread: String,
    },

    /// List checkpoints of a run, newest first.
    History {
        /// Thread id of the run.
        thread: String,

        /// Maximum number of checkpoints to display.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show the nodes that will run next for a thread.
    Pending {
        /// Thread id of the run.
        thread: String,
    },

    /// List runs waiting for human feedback.
    #[command(alias = "ls")]
    Suspended,

    /// Show the data directory and effective configuration.
    Config,
}
