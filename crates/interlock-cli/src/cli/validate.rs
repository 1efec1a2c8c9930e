//! `interlock validate`: parse and validate without running.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::json;

use interlock_core::workflow::{find_workflow_files, load_workflow_file};

use super::Output;

/// Per-file verdict.
struct Checked {
    path: PathBuf,
    outcome: Result<(String, usize), String>,
}

pub fn handle_validate(paths: &[PathBuf], output: Output) -> Result<bool> {
    let checked = check_paths(paths)?;
    let all_valid = checked.iter().all(|c| c.outcome.is_ok());

    if output.json {
        let out: Vec<_> = checked
            .iter()
            .map(|c| match &c.outcome {
                Ok((name, steps)) => json!({
                    "path": c.path.display().to_string(),
                    "valid": true,
                    "name": name,
                    "steps": steps,
                }),
                Err(error) => json!({
                    "path": c.path.display().to_string(),
                    "valid": false,
                    "error": error,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(all_valid);
    }

    if output.quiet {
        for c in &checked {
            if let Err(error) = &c.outcome {
                eprintln!("{}: {error}", c.path.display());
            }
        }
        return Ok(all_valid);
    }

    if checked.is_empty() {
        println!();
        println!("  No workflow files found.");
        println!();
        return Ok(true);
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("File").fg(Color::Cyan),
            Cell::new("Result"),
            Cell::new("Details"),
        ]);
    for c in &checked {
        let (result, details) = match &c.outcome {
            Ok((name, steps)) => (
                Cell::new("valid").fg(Color::Green),
                format!("{name} ({steps} steps)"),
            ),
            Err(error) => (Cell::new("invalid").fg(Color::Red), error.clone()),
        };
        table.add_row(vec![Cell::new(c.path.display()), result, Cell::new(details)]);
    }

    println!();
    println!("{table}");
    let invalid = checked.iter().filter(|c| c.outcome.is_err()).count();
    if invalid == 0 {
        println!("  {} all {} file(s) valid", style("*").green().bold(), checked.len());
    } else {
        println!("  {} {invalid} of {} file(s) invalid", style("✗").red().bold(), checked.len());
    }
    println!();

    Ok(all_valid)
}

fn check_paths(paths: &[PathBuf]) -> Result<Vec<Checked>> {
    let mut checked = Vec::new();
    for path in paths {
        let files = find_workflow_files(path)
            .with_context(|| format!("failed to scan {}", path.display()))?;
        checked.extend(files.into_iter().map(|file| check_file(&file)));
    }
    Ok(checked)
}

fn check_file(path: &Path) -> Checked {
    Checked {
        path: path.to_path_buf(),
        outcome: load_workflow_file(path)
            .map(|def| (def.name, def.steps.len()))
            .map_err(|e| e.to_string()),
    }
}
