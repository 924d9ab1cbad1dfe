//! cdf - Data flag client
//!
//! Create flag types and flags, vote on proposed flags, and query which data
//! is flagged.

mod commands;
mod input;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use dataflag_core::{Decision, FlagId, FlagStatus};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use input::{parse_json_object, parse_time, ScopeArgs, EXIT_USAGE};

/// cdf - create, review and query data flags
#[derive(Parser, Debug)]
#[command(name = "cdf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to $DATAFLAG_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long)]
    db: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Print times as unix seconds
    #[arg(long, global = true)]
    unix: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage flag types
    #[command(subcommand)]
    Type(TypeCommand),

    /// Create, inspect and review flags
    #[command(subcommand)]
    Flag(FlagCommand),

    /// Manage pipeline data revisions
    #[command(subcommand)]
    Revision(RevisionCommand),

    /// Vote on a proposed flag, then evaluate it
    Vote {
        /// Flag id
        flag: FlagId,

        /// approve or reject
        decision: Decision,

        /// Reviewer identity (defaults to $USER)
        #[arg(long)]
        reviewer: Option<String>,

        /// Comment stored with the vote
        #[arg(long)]
        notes: Option<String>,

        /// Data revision the decision is based on
        #[arg(long)]
        revision: Option<String>,

        /// Record the vote without evaluating the flag
        #[arg(long)]
        no_evaluate: bool,
    },

    /// Evaluate every proposed flag, rejecting those past their review window
    Sweep,

    /// Show active flags at a time or over a range
    Query {
        /// Time, or range start with --end
        #[arg(value_parser = parse_time)]
        time: f64,

        /// Range end (exclusive)
        #[arg(long, value_parser = parse_time)]
        end: Option<f64>,

        /// Only flags of this type
        #[arg(long = "type")]
        flag_type: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
    /// List flag types
    #[command(alias = "ls")]
    List,

    /// Register a new flag type
    Create {
        /// Type code, e.g. rfi
        code: String,

        /// Severity rank; higher is more severe
        #[arg(long)]
        severity: u32,

        /// Description of the flag type
        #[arg(long)]
        description: Option<String>,

        /// JSON object describing how flags of this type are made
        #[arg(long, value_parser = parse_json_object)]
        metadata: Option<serde_json::Value>,
    },

    /// Show one flag type
    Show {
        /// Type code
        code: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RevisionCommand {
    /// List data revisions
    #[command(alias = "ls")]
    List,

    /// Register a new data revision
    Create {
        /// Revision name, e.g. rev_07
        name: String,

        /// Description of the revision
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum FlagCommand {
    /// Propose a new flag
    Create {
        /// Flag type code
        flag_type: String,

        /// Start time
        #[arg(long, value_parser = parse_time)]
        start: f64,

        /// End time (exclusive); omit for an ongoing flag
        #[arg(long, value_parser = parse_time)]
        end: Option<f64>,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// JSON object with extra information
        #[arg(long, value_parser = parse_json_object)]
        metadata: Option<serde_json::Value>,

        /// Creator identity (defaults to $USER)
        #[arg(long)]
        by: Option<String>,

        /// Data revision the flag applies to
        #[arg(long)]
        revision: Option<String>,
    },

    /// List flags
    #[command(alias = "ls")]
    List {
        /// Only flags of this type
        #[arg(long = "type")]
        flag_type: Option<String>,

        /// Statuses to include (default: active)
        #[arg(long, value_delimiter = ',')]
        status: Vec<FlagStatus>,

        /// Include flags in every status
        #[arg(long, conflicts_with = "status")]
        all: bool,

        /// Only flags overlapping times from here
        #[arg(long, value_parser = parse_time)]
        start: Option<f64>,

        /// Only flags overlapping times before here
        #[arg(long, value_parser = parse_time)]
        end: Option<f64>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show one flag
    Show {
        /// Flag id
        id: FlagId,
    },

    /// Change the notes of a flag
    Edit {
        /// Flag id
        id: FlagId,

        /// New notes
        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        /// Remove the notes
        #[arg(long)]
        clear_notes: bool,
    },

    /// Show the status history of a flag
    History {
        /// Flag id
        id: FlagId,
    },

    /// Apply the review policy to a flag now
    Evaluate {
        /// Flag id
        id: FlagId,
    },

    /// List votes on a flag
    Votes {
        /// Flag id
        id: FlagId,
    },
}

/// Exit status when clap stops before running a command.
///
/// Help and version output are successes; anything else is a usage error,
/// kept apart from the error-kind codes.
fn parse_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_USAGE,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_exit_code(&err));
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
