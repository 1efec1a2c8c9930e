//! Per-run variable store.
//!
//! Seeded from the workflow's `variables`, written by output bindings, read
//! by the template interpolator and by run-condition expressions. A store
//! belongs to exactly one run and is discarded when the run ends; a snapshot
//! is kept in the `WorkflowResult`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Name-keyed binding table for one workflow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    values: Map<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with seed bindings.
    pub fn seeded(seed: &BTreeMap<String, Value>) -> Self {
        let values = seed
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self { values }
    }

    /// Bind `name`, returning the previous value if this is a re-binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        let previous = self.values.insert(name.clone(), value);
        if previous.is_some() {
            tracing::debug!(variable = %name, "variable re-bound");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of every binding, for reporting.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// The store as a JSON object, for expression contexts.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}
