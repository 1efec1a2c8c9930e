//! Run events for live reporters.
//!
//! `RunEvent` is broadcast by the orchestrator while a workflow executes.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Domain;
use crate::result::{StepStatus, WorkflowStatus};

/// Events emitted during a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run has started.
    RunStarted {
        run_id: Uuid,
        workflow: String,
        step_count: usize,
    },

    /// A step passed its run condition and is about to dispatch.
    StepStarted {
        run_id: Uuid,
        step: String,
        domain: Domain,
        index: usize,
    },

    /// A driver call failed and will be retried.
    StepRetrying {
        run_id: Uuid,
        step: String,
        attempt: u32,
        error: String,
    },

    /// A step produced its result.
    StepFinished {
        run_id: Uuid,
        step: String,
        status: StepStatus,
        duration_ms: u64,
    },

    /// The compensation sweep has begun.
    RollbackStarted {
        run_id: Uuid,
        compensations: usize,
    },

    /// One compensation or rollback step finished.
    CompensationFinished {
        run_id: Uuid,
        step: String,
        status: StepStatus,
    },

    /// The run reached a terminal status.
    RunFinished {
        run_id: Uuid,
        workflow: String,
        status: WorkflowStatus,
        duration_ms: u64,
    },
}

impl RunEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::StepStarted { run_id, .. }
            | RunEvent::StepRetrying { run_id, .. }
            | RunEvent::StepFinished { run_id, .. }
            | RunEvent::RollbackStarted { run_id, .. }
            | RunEvent::CompensationFinished { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}
