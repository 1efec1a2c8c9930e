//! Per-domain payloads: actions, validations, and raw outcomes.
//!
//! Every step targets exactly one [`Domain`]. The domain is carried as the
//! `domain` tag of the step's action, so a YAML step reads:
//!
//! ```yaml
//! action:
//!   domain: api
//!   method: POST
//!   endpoint: /users
//!   body: { name: "alice" }
//! validation:
//!   domain: api
//!   status: 201
//! ```
//!
//! The orchestrator never looks inside these payloads beyond template
//! interpolation; drivers execute actions and evaluators check outcomes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// The subsystem a step acts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Browser-driven user interface.
    Ui,
    /// HTTP API.
    Api,
    /// Relational database.
    Database,
    /// Arbitrary named handler.
    Custom,
}

impl Domain {
    /// All domains, in declaration order.
    pub const ALL: [Domain; 4] = [Domain::Ui, Domain::Api, Domain::Database, Domain::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Ui => "ui",
            Domain::Api => "api",
            Domain::Database => "database",
            Domain::Custom => "custom",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Domain-specific action payload, tagged by `domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum StepAction {
    Ui(UiAction),
    Api(ApiAction),
    Database(DatabaseAction),
    Custom(CustomAction),
}

impl StepAction {
    /// The domain this action targets.
    pub fn domain(&self) -> Domain {
        match self {
            StepAction::Ui(_) => Domain::Ui,
            StepAction::Api(_) => Domain::Api,
            StepAction::Database(_) => Domain::Database,
            StepAction::Custom(_) => Domain::Custom,
        }
    }

    /// One-line human-readable summary, used in logs and reports.
    pub fn summary(&self) -> String {
        match self {
            StepAction::Ui(ui) => {
                let target = ui.target.as_deref().unwrap_or("current page");
                format!("UI {} ({} interactions)", target, ui.interactions.len())
            }
            StepAction::Api(api) => format!("API {} {}", api.method, api.endpoint),
            StepAction::Database(db) => {
                let preview = if db.query.chars().count() > 60 {
                    let head: String = db.query.chars().take(60).collect();
                    format!("{head}...")
                } else {
                    db.query.clone()
                };
                format!("DB [{}] {}", db.connection, preview)
            }
            StepAction::Custom(custom) => format!("custom handler '{}'", custom.handler),
        }
    }
}

/// Browser navigation plus an ordered interaction list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiAction {
    /// URL to navigate to before interacting (None = stay on current page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Interactions performed in order after navigation.
    #[serde(default)]
    pub interactions: Vec<UiInteraction>,
    /// Selectors whose text the driver should capture into the outcome's `data`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capture: BTreeMap<String, String>,
}

/// A single browser interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiInteraction {
    Click { selector: String },
    Fill { selector: String, value: String },
    Select { selector: String, value: String },
    Press {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        key: String,
    },
    Hover { selector: String },
    Wait {
        selector: String,
        #[serde(default = "default_ui_wait_ms")]
        timeout_ms: u64,
    },
    Screenshot { name: String },
}

fn default_ui_wait_ms() -> u64 {
    5000
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiAction {
    #[serde(default = "default_method")]
    pub method: String,
    /// Absolute URL, or a path joined onto the driver's base URL.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// JSON request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A SQL statement against a named connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseAction {
    #[serde(default = "default_connection")]
    pub connection: String,
    pub query: String,
    /// Positional bind arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

fn default_connection() -> String {
    "default".to_string()
}

/// A call to a named custom handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAction {
    pub handler: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Validations
// ---------------------------------------------------------------------------

/// Declarative expectation over a step's outcome, tagged by `domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum Validation {
    Ui(UiValidation),
    Api(ApiValidation),
    Database(DatabaseValidation),
    Custom(CustomValidation),
}

impl Validation {
    pub fn domain(&self) -> Domain {
        match self {
            Validation::Ui(_) => Domain::Ui,
            Validation::Api(_) => Domain::Api,
            Validation::Database(_) => Domain::Database,
            Validation::Custom(_) => Domain::Custom,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_contains: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementExpectation>,
}

/// Expectation about one element located by selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementExpectation {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_contains: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Expected header values; names compare case-insensitively.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Assertions over the response, paths rooted at `{status, headers, body}`.
    #[serde(default)]
    pub body: Vec<PathAssertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_time_ms: Option<u64>,
}

/// Assertion on the value found at a path.
///
/// Every populated field must hold; an empty assertion only requires the
/// path to resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathAssertion {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<Value>,
    /// Substring for strings, element for arrays, key for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<Value>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_of: Option<JsonType>,
}

/// JSON value kinds for `type_of` assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseValidation {
    /// Rows in the result set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Rows changed by a statement without a result set (`INSERT`, `UPDATE`,
    /// `DELETE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    #[serde(default)]
    pub columns: Vec<ColumnExpectation>,
    #[serde(default)]
    pub predicates: Vec<RowPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_execution_time_ms: Option<u64>,
}

/// Expected value of one column in one row (row 0 by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnExpectation {
    #[serde(default)]
    pub row: usize,
    pub column: String,
    pub equals: Value,
}

/// Boolean expression evaluated with each row bound as `row`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPredicate {
    pub expression: String,
    #[serde(default)]
    pub scope: PredicateScope,
}

/// Which rows a predicate must hold for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateScope {
    #[default]
    All,
    Any,
    First,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomValidation {
    #[serde(default)]
    pub assertions: Vec<PathAssertion>,
    /// Boolean expression with the handler output bound as `output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw outcomes
// ---------------------------------------------------------------------------

/// What a driver observed after executing an action, tagged by `domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum RawOutcome {
    Ui(UiOutcome),
    Api(ApiOutcome),
    Database(DatabaseOutcome),
    Custom(CustomOutcome),
}

impl RawOutcome {
    pub fn domain(&self) -> Domain {
        match self {
            RawOutcome::Ui(_) => Domain::Ui,
            RawOutcome::Api(_) => Domain::Api,
            RawOutcome::Database(_) => Domain::Database,
            RawOutcome::Custom(_) => Domain::Custom,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiOutcome {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Observed element state keyed by selector.
    #[serde(default)]
    pub elements: BTreeMap<String, ElementState>,
    /// Captured values (see [`UiAction::capture`]).
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub present: bool,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiOutcome {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, or a JSON string when the body is not JSON.
    #[serde(default)]
    pub body: Value,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOutcome {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub rows_affected: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomOutcome {
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
