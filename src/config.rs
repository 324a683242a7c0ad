//! CLI configuration and argument parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("COU_BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("COU_BUILD_DATE");

/// Charmed OpenStack cloud upgrade tool.
///
/// Analyzes the applications of a model, plans the upgrade to the next
/// release and runs it step by step.
#[derive(Parser, Debug, Clone)]
#[command(name = "cou")]
#[command(about = "Charmed OpenStack cloud upgrade tool")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Model to upgrade (defaults to the current model)
    #[arg(short, long, env = "JUJU_MODEL")]
    pub model: Option<String>,

    /// Show upgrade plan without executing
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Skip the database backup before upgrading
    #[arg(long, default_value = "false")]
    pub no_backup: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, default_value = "false")]
    pub yes: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Release catalog YAML to use instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides -q/-v
    #[arg(long, env = "COU_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Application configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: Option<String>,
    pub dry_run: bool,
    pub backup: bool,
    pub yes: bool,
    pub catalog: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Create config from CLI arguments.
    pub fn from_args(args: Args) -> Self {
        let log_level = args
            .log_level
            .unwrap_or_else(|| verbosity_level(args.quiet, args.verbose).to_string());

        Self {
            model: args.model,
            dry_run: args.dry_run,
            backup: !args.no_backup,
            yes: args.yes,
            catalog: args.catalog,
            log_level,
        }
    }
}

/// Log level for the -q/-v flags.
fn verbosity_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
