//! `interlock run`: load, filter, and execute workflows as a suite.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use interlock_core::event::EventBus;
use interlock_core::workflow::{find_workflow_files, load_workflow_file, run_suite, WorkflowOrchestrator};
use interlock_infra::config::load_config_strict;
use interlock_infra::driver::build_registry;
use interlock_types::event::RunEvent;
use interlock_types::result::StepStatus;
use interlock_types::workflow::WorkflowDefinition;

use super::render::{print_suite_summary, print_workflow_result};
use super::{Output, RunArgs};

pub async fn handle_run(args: RunArgs, output: Output) -> Result<bool> {
    let config = load_config_strict(&args.config).await?;

    let definitions = load_definitions(&args.paths)?;
    let total_loaded = definitions.len();
    let definitions = filter_by_tags(definitions, &args.tags);
    if definitions.is_empty() {
        if !output.quiet {
            eprintln!(
                "  No workflows to run ({total_loaded} loaded, none matched the filters)."
            );
        }
        return Ok(true);
    }

    let registry = build_registry(&config)
        .await
        .context("failed to set up drivers")?;
    let bus = EventBus::new(config.event_capacity);
    let orchestrator = Arc::new(
        WorkflowOrchestrator::from_config(Arc::new(registry), &config).with_events(bus.clone()),
    );

    let printer = output
        .styled()
        .then(|| tokio::spawn(print_progress(bus.subscribe())));
    drop(bus);

    // One Ctrl-C cancels the whole suite: in-flight runs roll back, queued
    // runs never start.
    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling the suite");
                cancel.cancel();
            }
        })
    };

    let concurrency = args.concurrency.unwrap_or(config.max_concurrent_runs);
    let suite = run_suite(Arc::clone(&orchestrator), definitions, concurrency, cancel).await;

    canceller.abort();
    let _ = canceller.await;
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let suite = suite?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&suite)?);
    } else if !output.quiet {
        for result in &suite.results {
            print_workflow_result(result);
        }
        print_suite_summary(&suite);
    }

    Ok(suite.is_success())
}

/// Load every workflow under `paths`, failing on the first broken file.
fn load_definitions(paths: &[PathBuf]) -> Result<Vec<WorkflowDefinition>> {
    let mut definitions = Vec::new();
    for path in paths {
        let files = find_workflow_files(path)
            .with_context(|| format!("failed to scan {}", path.display()))?;
        if files.is_empty() {
            tracing::warn!(path = %path.display(), "no workflow files found");
        }
        for file in files {
            let def = load_workflow_file(&file)
                .with_context(|| format!("failed to load {}", file.display()))?;
            definitions.push(def);
        }
    }
    Ok(definitions)
}

/// Keep workflows carrying at least one of `tags` (all when `tags` is empty).
pub fn filter_by_tags(definitions: Vec<WorkflowDefinition>, tags: &[String]) -> Vec<WorkflowDefinition> {
    if tags.is_empty() {
        return definitions;
    }
    definitions
        .into_iter()
        .filter(|def| tags.iter().any(|t| def.has_tag(t)))
        .collect()
}

/// Print one line per finished step until every sender is gone.
async fn print_progress(mut rx: tokio::sync::broadcast::Receiver<RunEvent>) {
    loop {
        match rx.recv().await {
            Ok(RunEvent::RunStarted { workflow, step_count, .. }) => {
                println!("  {} {} ({step_count} steps)", style("▶").cyan(), style(workflow).bold());
            }
            Ok(RunEvent::StepFinished { step, status, duration_ms, .. }) => {
                let mark = match status {
                    StepStatus::Passed => style("✓").green(),
                    StepStatus::Skipped => style("-").dim(),
                    StepStatus::Failed | StepStatus::Error => style("✗").red(),
                };
                println!("    {mark} {step} {}", style(format!("{duration_ms}ms")).dim());
            }
            Ok(RunEvent::StepRetrying { step, attempt, .. }) => {
                println!("    {} {step} retrying after attempt {attempt}", style("↻").yellow());
            }
            Ok(RunEvent::RollbackStarted { compensations, .. }) => {
                println!("    {} rolling back ({compensations} compensations)", style("↺").yellow());
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "progress printer lagged behind run events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
