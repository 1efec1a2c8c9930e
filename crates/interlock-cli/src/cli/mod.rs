//! CLI command definitions for the `interlock` binary.
//!
//! Uses clap derive macros for argument parsing. Each handler returns
//! `Ok(true)` on success and `Ok(false)` when the command ran but found
//! failures (failed runs, invalid files).

pub mod list;
pub mod render;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run cross-domain integration-test workflows.
#[derive(Parser)]
#[command(name = "interlock", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "INTERLOCK_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run workflows from files or directories.
    Run(RunArgs),

    /// Parse and validate workflow files without running them.
    Validate {
        /// Workflow files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the workflows found under a directory.
    #[command(alias = "ls")]
    List {
        /// Directory to scan.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Workflow files or directories.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only run workflows carrying this tag (repeatable).
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,

    /// Config file.
    #[arg(long, short = 'c', default_value = interlock_infra::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Maximum concurrent runs (defaults to the config value).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// How handlers should print.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Styled, human-readable output is wanted.
    pub fn styled(&self) -> bool {
        !self.json && !self.quiet
    }
}
