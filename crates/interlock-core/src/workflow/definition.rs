//! Workflow definition parsing, validation, and discovery.
//!
//! Converts YAML files into `WorkflowDefinition`s, validates structural
//! constraints, and finds workflow files on disk. Validation runs before any
//! step executes, so a definition that passes here can only fail at runtime
//! for reasons that depend on the systems under test.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use interlock_types::workflow::{StepDefinition, WorkflowDefinition};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DefinitionError {
    /// YAML parse failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Serialize a `WorkflowDefinition` to YAML.
pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, DefinitionError> {
    serde_yaml_ng::to_string(def).map_err(|e| DefinitionError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty and there is at least one step
/// - Step names are non-empty and unique (rollback steps separately)
/// - Every validation targets the same domain as its action
/// - `expect_failure` is only set on steps with a validation
/// - `step_passed`/`step_failed` conditions name an earlier step
/// - Compensations and rollback steps carry no rollback of their own
/// - Output binding names are non-empty
/// - Timeouts are > 0 when set
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), DefinitionError> {
    let invalid = |msg: String| Err(DefinitionError::Validation(msg));

    if def.name.trim().is_empty() {
        return invalid("workflow name must not be empty".to_string());
    }
    if def.steps.is_empty() {
        return invalid(format!("workflow '{}' must have at least one step", def.name));
    }
    if def.timeout_secs == Some(0) {
        return invalid("workflow timeout_secs must be > 0".to_string());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for step in &def.steps {
        validate_step(step, "step")?;

        if let Some(referenced) = step.run_condition.referenced_step() {
            if !seen.contains(referenced) {
                return invalid(format!(
                    "step '{}' condition references '{}', which is not an earlier step",
                    step.name, referenced
                ));
            }
        }

        if !seen.insert(step.name.as_str()) {
            return invalid(format!("duplicate step name '{}'", step.name));
        }

        if let Some(rollback) = &step.rollback {
            validate_step(rollback, "compensation")?;
            if rollback.rollback.is_some() {
                return invalid(format!(
                    "compensation '{}' of step '{}' must not declare its own rollback",
                    rollback.name, step.name
                ));
            }
        }
    }

    let mut seen_rollback: HashSet<&str> = HashSet::new();
    for step in &def.rollback_steps {
        validate_step(step, "rollback step")?;
        if step.rollback.is_some() {
            return invalid(format!(
                "rollback step '{}' must not declare its own rollback",
                step.name
            ));
        }
        if !seen_rollback.insert(step.name.as_str()) {
            return invalid(format!("duplicate rollback step name '{}'", step.name));
        }
    }

    Ok(())
}

fn validate_step(step: &StepDefinition, kind: &str) -> Result<(), DefinitionError> {
    let invalid = |msg: String| Err(DefinitionError::Validation(msg));

    if step.name.trim().is_empty() {
        return invalid(format!("{kind} name must not be empty"));
    }
    if let Some(validation) = &step.validation {
        if validation.domain() != step.domain() {
            return invalid(format!(
                "{kind} '{}' has a {} action but a {} validation",
                step.name,
                step.domain(),
                validation.domain()
            ));
        }
    }
    if step.error_handling.expect_failure && step.validation.is_none() {
        return invalid(format!(
            "{kind} '{}' sets expect_failure but declares no validation",
            step.name
        ));
    }
    if step.timeout_secs == Some(0) {
        return invalid(format!("{kind} '{}' timeout_secs must be > 0", step.name));
    }
    if step.output_bindings.keys().any(|k| k.trim().is_empty()) {
        return invalid(format!("{kind} '{}' has an empty output binding name", step.name));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load and validate a workflow definition from a YAML file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow_yaml(&content)
}

/// Every `.yaml`/`.yml` file under `base_dir`, sorted by path.
pub fn find_workflow_files(base_dir: &Path) -> Result<Vec<PathBuf>, DefinitionError> {
    let mut files = Vec::new();
    if base_dir.is_file() {
        files.push(base_dir.to_path_buf());
        return Ok(files);
    }
    if !base_dir.exists() {
        return Ok(files);
    }
    collect_recursive(base_dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), DefinitionError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Load every valid workflow under `base_dir`.
///
/// Files that fail to parse or validate are skipped with a warning; use
/// [`find_workflow_files`] plus [`load_workflow_file`] to surface errors.
pub fn discover_workflows(
    base_dir: &Path,
) -> Result<Vec<(PathBuf, WorkflowDefinition)>, DefinitionError> {
    let mut results = Vec::new();
    for path in find_workflow_files(base_dir)? {
        match load_workflow_file(&path) {
            Ok(def) => results.push((path, def)),
            Err(e) => {
                tracing::warn!(?path, error = %e, "skipping invalid workflow file");
            }
        }
    }
    Ok(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
