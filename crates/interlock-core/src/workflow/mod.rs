//! Workflow execution.
//!
//! - `definition`: YAML parsing, structural validation, discovery
//! - `template` / `variables` / `extract`: data flow between steps
//! - `condition` / `expression`: run conditions and JEXL predicates
//! - `evaluator`: per-domain validation of raw outcomes
//! - `dispatcher` / `retry`: driver routing with timeouts and retries
//! - `rollback`: compensation ledger
//! - `orchestrator`: the run loop
//! - `suite`: bounded concurrent runs

pub mod condition;
pub mod definition;
pub mod dispatcher;
pub mod evaluator;
pub mod expression;
pub mod extract;
pub mod orchestrator;
pub mod retry;
pub mod rollback;
pub mod suite;
pub mod template;
pub mod variables;

pub use definition::{
    discover_workflows, find_workflow_files, load_workflow_file, parse_workflow_yaml,
    DefinitionError,
};
pub use orchestrator::{OrchestratorError, WorkflowOrchestrator};
pub use suite::{run_suite, SuiteError};
