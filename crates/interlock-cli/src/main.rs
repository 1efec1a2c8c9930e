//! interlock command-line entry point.
//!
//! Binary name: `interlock`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the command
//! handler. The process exits non-zero when a run or validation fails.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use interlock_observe::{init_tracing, shutdown_tracing, LogFormat, TracingOptions};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        n => TracingOptions::verbosity(n),
    };
    init_tracing(&TracingOptions {
        default_filter,
        format: if cli.log_json { LogFormat::Json } else { LogFormat::Pretty },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let output = cli::Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    let outcome = match cli.command {
        Commands::Run(args) => cli::run::handle_run(args, output).await,
        Commands::Validate { paths } => cli::validate::handle_validate(&paths, output),
        Commands::List { dir } => cli::list::handle_list(&dir, output),
    };

    shutdown_tracing();

    Ok(if outcome? { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
