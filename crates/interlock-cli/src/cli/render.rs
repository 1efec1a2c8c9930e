//! Styled terminal rendering of run results.

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use interlock_types::result::{StepResult, StepStatus, SuiteResult, WorkflowResult, WorkflowStatus};

pub fn workflow_status_cell(status: WorkflowStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        WorkflowStatus::Pending => cell.fg(Color::Yellow),
        WorkflowStatus::Running => cell.fg(Color::Blue),
        WorkflowStatus::Completed => cell.fg(Color::Green),
        WorkflowStatus::Failed | WorkflowStatus::Aborted => cell.fg(Color::Red),
        WorkflowStatus::RolledBack => cell.fg(Color::DarkYellow),
    }
}

pub fn step_status_cell(status: StepStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        StepStatus::Passed => cell.fg(Color::Green),
        StepStatus::Failed | StepStatus::Error => cell.fg(Color::Red),
        StepStatus::Skipped => cell.fg(Color::DarkGrey),
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn step_table(results: &[StepResult], compensations: bool) -> Table {
    let mut table = new_table();
    let mut header = vec![
        Cell::new("Step").fg(Color::Cyan),
        Cell::new("Status"),
        Cell::new("Duration"),
        Cell::new("Retries"),
    ];
    if compensations {
        header.push(Cell::new("Compensates"));
    }
    header.push(Cell::new("Error"));
    table.set_header(header);

    for r in results {
        let mut row = vec![
            Cell::new(&r.name),
            step_status_cell(r.status),
            Cell::new(format!("{}ms", r.duration_ms)),
            Cell::new(r.retries_used),
        ];
        if compensations {
            row.push(Cell::new(r.compensates.as_deref().unwrap_or("-")));
        }
        row.push(Cell::new(r.error.as_deref().unwrap_or("")));
        table.add_row(row);
    }
    table
}

/// Print one run: header line, step table, rollback table, and failing
/// validation detail.
pub fn print_workflow_result(result: &WorkflowResult) {
    let mark = if result.is_success() {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    println!();
    println!(
        "  {} {} {} ({}ms, run {})",
        mark,
        style(&result.name).cyan(),
        status_text(result.status),
        result.duration_ms(),
        style(short_id(&result.run_id.to_string())).dim()
    );
    if let Some(reason) = &result.abort_reason {
        println!("    {} {}", style("Stopped:").bold(), reason);
    }

    if !result.step_results.is_empty() {
        println!("{}", step_table(&result.step_results, false));
    }

    for step in result
        .step_results
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
    {
        if let Some(detail) = &step.validation_detail {
            println!("    {} {}", style(&step.name).bold(), style("validation:").dim());
            for line in detail.lines() {
                println!("      {line}");
            }
        }
    }

    if result.rollback_executed {
        println!("    {}", style("Rollback").bold());
        if result.rollback_results.is_empty() {
            println!("      nothing to compensate");
        } else {
            println!("{}", step_table(&result.rollback_results, true));
        }
    }
}

/// Print the one-table summary of a suite.
pub fn print_suite_summary(suite: &SuiteResult) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Workflow").fg(Color::Cyan),
        Cell::new("Status"),
        Cell::new("Passed"),
        Cell::new("Failed"),
        Cell::new("Skipped"),
        Cell::new("Duration"),
    ]);
    for r in &suite.results {
        table.add_row(vec![
            Cell::new(&r.name),
            workflow_status_cell(r.status),
            Cell::new(r.count(StepStatus::Passed)),
            Cell::new(r.count(StepStatus::Failed) + r.count(StepStatus::Error)),
            Cell::new(r.count(StepStatus::Skipped)),
            Cell::new(format!("{}ms", r.duration_ms())),
        ]);
    }

    println!();
    println!("{table}");
    let verdict = if suite.is_success() {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    println!(
        "  {} {} workflow(s): {} passed, {} failed in {}ms",
        verdict, suite.total, suite.passed, suite.failed, suite.duration_ms
    );
    println!();
}

fn status_text(status: WorkflowStatus) -> console::StyledObject<String> {
    let text = status.to_string();
    match status {
        WorkflowStatus::Completed => style(text).green(),
        WorkflowStatus::RolledBack => style(text).yellow(),
        WorkflowStatus::Failed | WorkflowStatus::Aborted => style(text).red(),
        _ => style(text).dim(),
    }
}

pub fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}
