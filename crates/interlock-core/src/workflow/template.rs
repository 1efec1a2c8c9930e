//! `{{.name}}` template interpolation.
//!
//! A token is `{{` + optional whitespace + `.` + path + optional whitespace +
//! `}}`. The path's first segment names a variable; any further segments
//! descend into its value (`{{ .user.emails[0] }}`). A `{{` that does not
//! open a token is copied verbatim and scanning resumes right after it, so a
//! real token later in the same span is still substituted.
//!
//! Interpolation runs immediately before dispatch so each step sees the
//! bindings of every step before it.

use serde_json::{Map, Value};

use interlock_types::domain::{
    ApiAction, CustomAction, DatabaseAction, StepAction, UiAction, UiInteraction,
};

use super::extract::{parse_path, resolve, PathSegment};
use super::variables::VariableStore;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A token names a variable (or a path inside one) that is not bound.
    #[error("unresolved variable '{name}'")]
    UnresolvedVariable { name: String },

    #[error("invalid template token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },
}

impl TemplateError {
    /// The variable expression that failed, for abort reasons.
    pub fn variable(&self) -> &str {
        match self {
            TemplateError::UnresolvedVariable { name } => name,
            TemplateError::InvalidToken { token, .. } => token,
        }
    }
}

// ---------------------------------------------------------------------------
// String interpolation
// ---------------------------------------------------------------------------

/// Replace every token in `raw` with the textual form of its binding.
///
/// Strings substitute without quotes; other values substitute as JSON.
pub fn interpolate(raw: &str, store: &VariableStore) -> Result<String, TemplateError> {
    if !raw.contains(OPEN) {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);

        let inner = after_open[..end].trim();
        match inner.strip_prefix('.') {
            Some(path) if !path.contains(OPEN) => {
                let value = lookup(path, store)?;
                out.push_str(&value_to_text(value));
                rest = &after_open[end + CLOSE.len()..];
            }
            // Not a token: keep the braces and rescan what follows them.
            _ => {
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Interpolate a JSON value, preserving bound types.
///
/// A string that is exactly one token becomes the bound value itself; any
/// other string is interpolated textually. Arrays and object values recurse;
/// object keys are left alone.
pub fn interpolate_value(value: &Value, store: &VariableStore) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => match single_token(s) {
            Some(path) => lookup(path, store).cloned(),
            None => interpolate(s, store).map(Value::String),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| interpolate_value(item, store))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => interpolate_map(map, store).map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn interpolate_map(
    map: &Map<String, Value>,
    store: &VariableStore,
) -> Result<Map<String, Value>, TemplateError> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), interpolate_value(value, store)?)))
        .collect()
}

/// The path of `s` if the whole string (ignoring outer whitespace) is one token.
fn single_token(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
        return None;
    }
    inner.trim().strip_prefix('.')
}

fn lookup<'a>(path: &str, store: &'a VariableStore) -> Result<&'a Value, TemplateError> {
    let segments = parse_path(path).map_err(|e| TemplateError::InvalidToken {
        token: path.to_string(),
        reason: e.to_string(),
    })?;

    let (name, rest) = match segments.split_first() {
        Some((PathSegment::Key(name), rest)) => (name, rest),
        _ => {
            return Err(TemplateError::InvalidToken {
                token: path.to_string(),
                reason: "token must start with a variable name".to_string(),
            });
        }
    };

    let unresolved = || TemplateError::UnresolvedVariable {
        name: path.to_string(),
    };
    let root = store.get(name).ok_or_else(unresolved)?;
    resolve(root, rest, path).map_err(|_| unresolved())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Action interpolation
// ---------------------------------------------------------------------------

/// Interpolate every string field of an action.
///
/// Structured fields (API body, database args, custom params) are
/// interpolated value-wise via [`interpolate_value`].
pub fn interpolate_action(
    action: &StepAction,
    store: &VariableStore,
) -> Result<StepAction, TemplateError> {
    let text = |s: &String| interpolate(s, store);

    Ok(match action {
        StepAction::Ui(ui) => StepAction::Ui(UiAction {
            target: ui.target.as_ref().map(text).transpose()?,
            interactions: ui
                .interactions
                .iter()
                .map(|i| interpolate_interaction(i, store))
                .collect::<Result<_, _>>()?,
            capture: ui
                .capture
                .iter()
                .map(|(k, v)| Ok((k.clone(), text(v)?)))
                .collect::<Result<_, TemplateError>>()?,
        }),
        StepAction::Api(api) => StepAction::Api(ApiAction {
            method: text(&api.method)?,
            endpoint: text(&api.endpoint)?,
            headers: api
                .headers
                .iter()
                .map(|(k, v)| Ok((k.clone(), text(v)?)))
                .collect::<Result<_, TemplateError>>()?,
            query: api
                .query
                .iter()
                .map(|(k, v)| Ok((k.clone(), text(v)?)))
                .collect::<Result<_, TemplateError>>()?,
            body: api
                .body
                .as_ref()
                .map(|b| interpolate_value(b, store))
                .transpose()?,
        }),
        StepAction::Database(db) => StepAction::Database(DatabaseAction {
            connection: text(&db.connection)?,
            query: text(&db.query)?,
            args: db
                .args
                .iter()
                .map(|a| interpolate_value(a, store))
                .collect::<Result<_, _>>()?,
        }),
        StepAction::Custom(custom) => StepAction::Custom(CustomAction {
            handler: text(&custom.handler)?,
            params: interpolate_map(&custom.params, store)?,
        }),
    })
}

fn interpolate_interaction(
    interaction: &UiInteraction,
    store: &VariableStore,
) -> Result<UiInteraction, TemplateError> {
    let text = |s: &String| interpolate(s, store);

    Ok(match interaction {
        UiInteraction::Click { selector } => UiInteraction::Click {
            selector: text(selector)?,
        },
        UiInteraction::Fill { selector, value } => UiInteraction::Fill {
            selector: text(selector)?,
            value: text(value)?,
        },
        UiInteraction::Select { selector, value } => UiInteraction::Select {
            selector: text(selector)?,
            value: text(value)?,
        },
        UiInteraction::Press { selector, key } => UiInteraction::Press {
            selector: selector.as_ref().map(text).transpose()?,
            key: text(key)?,
        },
        UiInteraction::Hover { selector } => UiInteraction::Hover {
            selector: text(selector)?,
        },
        UiInteraction::Wait {
            selector,
            timeout_ms,
        } => UiInteraction::Wait {
            selector: text(selector)?,
            timeout_ms: *timeout_ms,
        },
        UiInteraction::Screenshot { name } => UiInteraction::Screenshot { name: text(name)? },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
