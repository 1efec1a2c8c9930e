//! End-to-end orchestrator scenarios over in-memory drivers.
//!
//! `UserApi` and `UserTable` share one user map, so what the API step
//! creates is what the database step sees.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use interlock_core::driver::{DomainDriver, DriverError, DriverRegistry};
use interlock_core::event::EventBus;
use interlock_core::workflow::{parse_workflow_yaml, WorkflowOrchestrator};
use interlock_types::domain::{
    ApiAction, ApiOutcome, ApiValidation, CustomAction, CustomOutcome, DatabaseAction,
    DatabaseOutcome, DatabaseValidation, Domain, RawOutcome, StepAction, Validation,
};
use interlock_types::event::RunEvent;
use interlock_types::result::{AbortReason, StepStatus, WorkflowStatus};
use interlock_types::workflow::{StepDefinition, StepErrorPolicy, WorkflowDefinition};

// ---------------------------------------------------------------------------
// Mock drivers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Backend {
    users: Mutex<BTreeMap<u64, String>>,
    next_id: AtomicU64,
    api_calls: Mutex<Vec<String>>,
    db_args: Mutex<Vec<Vec<Value>>>,
    db_attempts: AtomicU32,
}

struct UserApi(Arc<Backend>);

impl DomainDriver for UserApi {
    fn domain(&self) -> Domain {
        Domain::Api
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        let StepAction::Api(api) = action else {
            return Err(DriverError::InvalidAction("expected api".into()));
        };
        self.0
            .api_calls
            .lock()
            .unwrap()
            .push(format!("{} {}", api.method, api.endpoint));

        let (status, body) = match (api.method.as_str(), api.endpoint.as_str()) {
            ("POST", "/users") => {
                let id = self.0.next_id.fetch_add(1, Ordering::SeqCst) + 42;
                let name = api
                    .body
                    .as_ref()
                    .and_then(|b| b.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("anon")
                    .to_string();
                self.0.users.lock().unwrap().insert(id, name.clone());
                (201, json!({ "id": id, "name": name }))
            }
            ("DELETE", path) if path.starts_with("/users/") => {
                let id: u64 = path["/users/".len()..]
                    .parse()
                    .map_err(|_| DriverError::Request("bad id".into()))?;
                match self.0.users.lock().unwrap().remove(&id) {
                    Some(_) => (204, Value::Null),
                    None => (404, Value::Null),
                }
            }
            _ => (404, Value::Null),
        };

        Ok(RawOutcome::Api(ApiOutcome {
            status,
            headers: BTreeMap::new(),
            body,
            elapsed_ms: 1,
        }))
    }
}

/// Answers `SELECT` with the user whose id is the first arg; `broken`
/// queries always error.
struct UserTable(Arc<Backend>);

impl DomainDriver for UserTable {
    fn domain(&self) -> Domain {
        Domain::Database
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        let StepAction::Database(db) = action else {
            return Err(DriverError::InvalidAction("expected database".into()));
        };
        self.0.db_attempts.fetch_add(1, Ordering::SeqCst);
        self.0.db_args.lock().unwrap().push(db.args.clone());

        if db.query.contains("broken") {
            return Err(DriverError::Query("no such table: broken".into()));
        }

        let id = db.args.first().and_then(Value::as_u64);
        let rows = id
            .and_then(|id| {
                self.0.users.lock().unwrap().get(&id).map(|name| {
                    let mut row = Map::new();
                    row.insert("id".into(), json!(id));
                    row.insert("name".into(), json!(name));
                    row
                })
            })
            .into_iter()
            .collect();

        Ok(RawOutcome::Database(DatabaseOutcome {
            columns: vec!["id".into(), "name".into()],
            rows,
            rows_affected: 0,
            elapsed_ms: 1,
        }))
    }
}

/// Custom handlers: every call logs its label; `fail` errors; `hang` sleeps
/// for an hour.
struct Steps(Arc<Mutex<Vec<String>>>);

impl DomainDriver for Steps {
    fn domain(&self) -> Domain {
        Domain::Custom
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        let StepAction::Custom(custom) = action else {
            return Err(DriverError::InvalidAction("expected custom".into()));
        };
        let label = custom
            .params
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(&custom.handler)
            .to_string();
        self.0.lock().unwrap().push(label);
        match custom.handler.as_str() {
            "fail" => Err(DriverError::Handler("step failed on purpose".into())),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RawOutcome::Custom(CustomOutcome::default()))
            }
            _ => Ok(RawOutcome::Custom(CustomOutcome {
                data: Value::Object(custom.params.clone()),
            })),
        }
    }
}

struct Harness {
    backend: Arc<Backend>,
    custom_calls: Arc<Mutex<Vec<String>>>,
    orchestrator: WorkflowOrchestrator,
}

fn harness() -> Harness {
    let backend = Arc::new(Backend::default());
    let custom_calls = Arc::new(Mutex::new(Vec::new()));
    let registry = DriverRegistry::new()
        .with(UserApi(backend.clone()))
        .with(UserTable(backend.clone()))
        .with(Steps(custom_calls.clone()));
    Harness {
        backend,
        custom_calls,
        orchestrator: WorkflowOrchestrator::new(Arc::new(registry)),
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn create_user() -> StepDefinition {
    StepDefinition::new(
        "create_user",
        StepAction::Api(ApiAction {
            method: "POST".into(),
            endpoint: "/users".into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: Some(json!({ "name": "alice" })),
        }),
    )
    .with_validation(Validation::Api(ApiValidation {
        status: Some(201),
        ..Default::default()
    }))
    .with_binding("userId", "body.id")
}

fn delete_user() -> StepDefinition {
    StepDefinition::new(
        "delete_user",
        StepAction::Api(ApiAction {
            method: "DELETE".into(),
            endpoint: "/users/{{.userId}}".into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
        }),
    )
}

fn select_user(query: &str) -> StepDefinition {
    StepDefinition::new(
        "verify_user",
        StepAction::Database(DatabaseAction {
            connection: "default".into(),
            query: query.into(),
            args: vec![json!("{{.userId}}")],
        }),
    )
    .with_validation(Validation::Database(DatabaseValidation {
        row_count: Some(1),
        ..Default::default()
    }))
}

fn custom(name: &str, handler: &str) -> StepDefinition {
    let mut params = Map::new();
    params.insert("label".into(), json!(name));
    StepDefinition::new(
        name,
        StepAction::Custom(CustomAction {
            handler: handler.into(),
            params,
        }),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_user_is_visible_to_database_step() {
    let h = harness();
    let def = WorkflowDefinition::new("user-signup")
        .with_step(create_user())
        .with_step(select_user("SELECT id, name FROM users WHERE id = ?"));

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert!(!result.rollback_executed);
    assert_eq!(result.step_results.len(), 2);
    assert!(result
        .step_results
        .iter()
        .all(|r| r.status == StepStatus::Passed));
    assert_eq!(result.variables.get("userId"), Some(&json!(42)));
}

#[tokio::test]
async fn bound_value_keeps_its_json_type() {
    let h = harness();
    let def = WorkflowDefinition::new("types")
        .with_step(create_user())
        .with_step(select_user("SELECT id, name FROM users WHERE id = ?"));

    h.orchestrator.run(&def).await.unwrap();

    let args = h.backend.db_args.lock().unwrap().clone();
    assert_eq!(args, vec![vec![json!(42)]]);
    assert!(args[0][0].is_u64());
}

#[tokio::test]
async fn failing_query_rolls_back_created_user() {
    let h = harness();
    let def = WorkflowDefinition::new("user-signup")
        .with_step(create_user().with_rollback(delete_user()))
        .with_step(
            select_user("SELECT * FROM broken WHERE id = ?").with_error_handling(
                StepErrorPolicy::default()
                    .with_retries(1, 0)
                    .continuing(false)
                    .triggering_rollback(),
            ),
        );

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::RolledBack);
    assert!(result.rollback_executed);
    assert_eq!(result.step_results.len(), 2);
    assert_eq!(result.step_results[0].status, StepStatus::Passed);
    assert_eq!(result.step_results[1].status, StepStatus::Error);
    assert_eq!(result.step_results[1].retries_used, 1);
    assert_eq!(h.backend.db_attempts.load(Ordering::SeqCst), 2);

    assert_eq!(result.rollback_results.len(), 1);
    let compensation = &result.rollback_results[0];
    assert_eq!(compensation.name, "delete_user");
    assert_eq!(compensation.compensates.as_deref(), Some("create_user"));
    assert_eq!(compensation.status, StepStatus::Passed);

    assert!(h.backend.users.lock().unwrap().is_empty());
    assert_eq!(
        *h.backend.api_calls.lock().unwrap(),
        vec!["POST /users", "DELETE /users/42"]
    );
}

#[tokio::test]
async fn compensations_run_in_reverse_success_order() {
    let h = harness();
    let def = WorkflowDefinition::new("saga")
        .with_step(custom("s1", "ok").with_rollback(custom("r1", "ok")))
        .with_step(custom("s2", "ok").with_rollback(custom("r2", "ok")))
        .with_step(
            custom("s3", "fail")
                .with_rollback(custom("r3", "ok"))
                .with_error_handling(StepErrorPolicy::default().triggering_rollback()),
        );

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::RolledBack);
    assert_eq!(
        *h.custom_calls.lock().unwrap(),
        vec!["s1", "s2", "s3", "r2", "r1"]
    );
    let names: Vec<_> = result
        .rollback_results
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, ["r2", "r1"]);
}

#[tokio::test]
async fn failure_without_rollback_request_leaves_ledger_untouched() {
    let h = harness();
    let def = WorkflowDefinition::new("no-undo")
        .with_step(custom("s1", "ok").with_rollback(custom("r1", "ok")))
        .with_step(custom("s2", "fail"));

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Aborted);
    assert!(!result.rollback_executed);
    assert!(result.rollback_results.is_empty());
    assert_eq!(*h.custom_calls.lock().unwrap(), vec!["s1", "s2"]);
}

#[tokio::test]
async fn retry_bound_is_initial_plus_max_retries() {
    let h = harness();
    let def = WorkflowDefinition::new("retries")
        .with_variable("userId", json!(1))
        .with_step(
            select_user("SELECT * FROM broken")
                .with_error_handling(StepErrorPolicy::default().with_retries(2, 0)),
        );

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(h.backend.db_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(result.step_results[0].status, StepStatus::Error);
    assert_eq!(result.step_results[0].retries_used, 2);
    assert_eq!(result.status, WorkflowStatus::Aborted);
}

#[tokio::test]
async fn expected_failure_passes_on_mismatch() {
    let h = harness();
    let lookup_missing = select_user("SELECT id, name FROM users WHERE id = ?")
        .with_error_handling(StepErrorPolicy::default().expecting_failure());
    let def = WorkflowDefinition::new("negative")
        .with_variable("userId", json!(999))
        .with_step(lookup_missing);

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.step_results[0].status, StepStatus::Passed);
    assert_eq!(result.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn unresolved_variable_aborts_before_dispatch() {
    let h = harness();
    let def = WorkflowDefinition::new("unbound")
        .with_step(select_user("SELECT id FROM users WHERE id = ?"));

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(h.backend.db_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(result.status, WorkflowStatus::Aborted);
    assert_eq!(
        result.abort_reason,
        Some(AbortReason::UnresolvedVariable {
            step: "verify_user".into(),
            variable: "userId".into(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn workflow_timeout_interrupts_step_and_rolls_back() {
    let h = harness();
    let def = WorkflowDefinition::new("slow")
        .with_timeout_secs(5)
        .with_step(custom("s1", "ok").with_rollback(custom("r1", "ok")))
        .with_step(custom("s2", "hang"))
        .with_step(custom("s3", "ok"));

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::RolledBack);
    assert_eq!(result.abort_reason, Some(AbortReason::Timeout { after_secs: 5 }));
    assert_eq!(result.step_results.len(), 2);
    assert_eq!(result.step_results[1].status, StepStatus::Error);
    assert_eq!(*h.custom_calls.lock().unwrap(), vec!["s1", "s2", "r1"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_without_compensations_is_aborted() {
    let h = harness();
    let def = WorkflowDefinition::new("cancel")
        .with_step(custom("s1", "ok"))
        .with_step(custom("s2", "hang"));

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = h
        .orchestrator
        .run_with_cancellation(&def, token)
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::Cancelled));
    assert!(!result.rollback_executed);
    assert!(h.orchestrator.active_runs().is_empty());
}

#[tokio::test]
async fn events_trace_the_run() {
    let backend = Arc::new(Backend::default());
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let registry = DriverRegistry::new()
        .with(UserApi(backend.clone()))
        .with(UserTable(backend));
    let orchestrator = WorkflowOrchestrator::new(Arc::new(registry)).with_events(bus);

    let def = WorkflowDefinition::new("events")
        .with_step(create_user())
        .with_step(select_user("SELECT id FROM users WHERE id = ?"));
    orchestrator.run(&def).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::StepStarted { .. } => "step_started",
            RunEvent::StepFinished { .. } => "step_finished",
            RunEvent::RunFinished { .. } => "run_finished",
            _ => "other",
        });
    }
    assert_eq!(
        kinds,
        [
            "run_started",
            "step_started",
            "step_finished",
            "step_started",
            "step_finished",
            "run_finished"
        ]
    );
}

#[tokio::test]
async fn yaml_workflow_runs_end_to_end() {
    let h = harness();
    let yaml = r#"
name: yaml-signup
steps:
  - name: create_user
    action:
      domain: api
      method: POST
      endpoint: /users
      body: { name: bob }
    validation:
      domain: api
      status: 201
      body:
        - path: body.name
          equals: bob
    output_bindings:
      userId: body.id
  - name: verify_user
    action:
      domain: database
      query: SELECT id, name FROM users WHERE id = ?
      args: ["{{.userId}}"]
    validation:
      domain: database
      row_count: 1
      columns:
        - column: name
          equals: bob
"#;
    let def = parse_workflow_yaml(yaml).unwrap();

    let result = h.orchestrator.run(&def).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed, "{result:#?}");
}
