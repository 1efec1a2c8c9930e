//! `interlock list`: show the workflows found under a directory.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::json;

use interlock_core::workflow::discover_workflows;

use super::Output;

pub fn handle_list(dir: &Path, output: Output) -> Result<bool> {
    let workflows = discover_workflows(dir)
        .with_context(|| format!("failed to scan {}", dir.display()))?;

    if output.json {
        let out: Vec<_> = workflows
            .iter()
            .map(|(path, def)| {
                json!({
                    "path": path.display().to_string(),
                    "name": def.name,
                    "description": def.description,
                    "tags": def.tags,
                    "steps": def.steps.len(),
                    "domains": def.domains().iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(true);
    }

    if output.quiet {
        for (_, def) in &workflows {
            println!("{}", def.name);
        }
        return Ok(true);
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows found in {}.", style(dir.display()).cyan());
        println!();
        return Ok(true);
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Steps"),
            Cell::new("Domains"),
            Cell::new("Tags"),
            Cell::new("File"),
        ]);

    for (path, def) in &workflows {
        let domains: Vec<&str> = def.domains().iter().map(|d| d.as_str()).collect();
        table.add_row(vec![
            Cell::new(&def.name),
            Cell::new(def.steps.len()),
            Cell::new(domains.join(", ")),
            Cell::new(def.tags.join(", ")),
            Cell::new(path.strip_prefix(dir).unwrap_or(path).display()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(true)
}
