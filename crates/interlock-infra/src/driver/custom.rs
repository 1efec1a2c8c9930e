//! In-process handlers for the custom domain.
//!
//! A handler takes the step's (interpolated) params and returns the JSON
//! data that custom validations and bindings read. Built-ins:
//!
//! | handler | behavior |
//! |---|---|
//! | `echo`  | returns the params unchanged |
//! | `sleep` | waits `ms` milliseconds, returns `{ "slept_ms": ms }` |
//! | `fail`  | errors with `message` (for negative-path workflows) |

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Map, Value};

use interlock_core::driver::{DomainDriver, DriverError};
use interlock_types::domain::{CustomOutcome, Domain, RawOutcome, StepAction};

type Handler = Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<Value, DriverError>> + Send + Sync>;

/// `DomainDriver` for `Domain::Custom`: a name -> handler table.
#[derive(Clone)]
pub struct CustomDriver {
    handlers: HashMap<String, Handler>,
}

impl CustomDriver {
    /// A driver with the built-in handlers registered.
    pub fn new() -> Self {
        Self::empty()
            .with_handler("echo", |params| async move { Ok(Value::Object(params)) })
            .with_handler("sleep", |params| async move {
                let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({ "slept_ms": ms }))
            })
            .with_handler("fail", |params| async move {
                let message = params
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("fail handler invoked");
                Err(DriverError::Handler(message.to_string()))
            })
    }

    /// A driver with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn with_handler<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DriverError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| handler(params).boxed());
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CustomDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CustomDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomDriver")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

impl DomainDriver for CustomDriver {
    fn domain(&self) -> Domain {
        Domain::Custom
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        let StepAction::Custom(custom) = action else {
            return Err(DriverError::WrongDomain {
                domain: Domain::Custom,
                actual: action.domain(),
            });
        };
        let handler = self
            .handlers
            .get(&custom.handler)
            .ok_or_else(|| DriverError::UnknownHandler(custom.handler.clone()))?;

        tracing::debug!(handler = %custom.handler, "invoking custom handler");
        let data = handler(custom.params.clone()).await?;
        Ok(RawOutcome::Custom(CustomOutcome { data }))
    }
}
