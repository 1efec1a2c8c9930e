//! Path expressions and output extraction.
//!
//! A path addresses a value inside a JSON document: `body.user.id`,
//! `items[0].name`, `headers["content-type"]`. A leading `$` or `.` is
//! accepted and ignored. Dotted numeric segments index arrays (`items.0`).
//!
//! Extraction never yields a silent null: a key or index that is absent is an
//! [`ExtractionError`]. A value that is present and null resolves to null.
//!
//! Each domain roots paths differently:
//! - API: `{status, headers, body, elapsed_ms}`
//! - UI: `{url, title, elements, data}`
//! - Custom: the handler's `data` value
//! - Database: a column name, optionally row-qualified (`2.email`)

use serde_json::{json, Value};

use interlock_types::domain::{
    ApiOutcome, CustomOutcome, DatabaseOutcome, JsonType, RawOutcome, UiOutcome,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path '{path}' did not resolve: {reason}")]
    Unresolved { path: String, reason: String },

    #[error("row {row} out of range ({rows} rows returned)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("column '{column}' not found in row {row}")]
    MissingColumn { column: String, row: usize },
}

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a path expression into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ExtractionError> {
    let invalid = |reason: &str| ExtractionError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty path"));
    }
    let body = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let body = body.strip_prefix('.').unwrap_or(body);

    let chars: Vec<char> = body.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                if i >= chars.len() || chars[i] == '.' || chars[i] == '[' {
                    return Err(invalid("empty segment after '.'"));
                }
            }
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| invalid("unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                if let Some(key) = strip_quotes(inner) {
                    segments.push(PathSegment::Key(key.to_string()));
                } else {
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| invalid("bracket must hold an index or a quoted key"))?;
                    segments.push(PathSegment::Index(index));
                }
                i = close + 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                let key = key.trim();
                if key.is_empty() {
                    return Err(invalid("empty segment"));
                }
                segments.push(PathSegment::Key(key.to_string()));
            }
        }
    }

    Ok(segments)
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Walk `segments` from `root`. `path` is only used in error messages.
pub fn resolve<'a>(
    root: &'a Value,
    segments: &[PathSegment],
    path: &str,
) -> Result<&'a Value, ExtractionError> {
    let unresolved = |reason: String| ExtractionError::Unresolved {
        path: path.to_string(),
        reason,
    };

    let mut current = root;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map
                .get(key)
                .ok_or_else(|| unresolved(format!("key '{key}' not found")))?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index).ok_or_else(
                || unresolved(format!("index {index} out of bounds (len {})", items.len())),
            )?,
            (PathSegment::Key(key), Value::Array(items)) => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| unresolved(format!("key '{key}' applied to an array")))?;
                items.get(index).ok_or_else(|| {
                    unresolved(format!("index {index} out of bounds (len {})", items.len()))
                })?
            }
            (segment, other) => {
                return Err(unresolved(format!(
                    "cannot descend into {:?} with {:?}",
                    JsonType::of(other),
                    segment
                )));
            }
        };
    }
    Ok(current)
}

/// Parse and resolve in one go.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Result<&'a Value, ExtractionError> {
    let segments = parse_path(path)?;
    resolve(root, &segments, path)
}

// ---------------------------------------------------------------------------
// Domain roots
// ---------------------------------------------------------------------------

/// Document API paths are resolved against.
pub fn api_root(outcome: &ApiOutcome) -> Value {
    json!({
        "status": outcome.status,
        "headers": outcome.headers,
        "body": outcome.body,
        "elapsed_ms": outcome.elapsed_ms,
    })
}

/// Document UI paths are resolved against.
pub fn ui_root(outcome: &UiOutcome) -> Value {
    json!({
        "url": outcome.url,
        "title": outcome.title,
        "elements": outcome.elements,
        "data": outcome.data,
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Evaluate one extraction expression against a raw outcome.
pub fn extract(outcome: &RawOutcome, expression: &str) -> Result<Value, ExtractionError> {
    match outcome {
        RawOutcome::Api(api) => lookup_path(&api_root(api), expression).cloned(),
        RawOutcome::Ui(ui) => lookup_path(&ui_root(ui), expression).cloned(),
        RawOutcome::Custom(CustomOutcome { data }) => lookup_path(data, expression).cloned(),
        RawOutcome::Database(db) => extract_column(db, expression),
    }
}

/// `column` reads row 0; `N.column` reads row N.
fn extract_column(outcome: &DatabaseOutcome, expression: &str) -> Result<Value, ExtractionError> {
    let expression = expression.trim();
    let (row, column) = match expression.split_once('.') {
        Some((prefix, column)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            let row = prefix.parse::<usize>().map_err(|e| ExtractionError::InvalidPath {
                path: expression.to_string(),
                reason: e.to_string(),
            })?;
            (row, column)
        }
        _ => (0, expression),
    };

    if column.is_empty() {
        return Err(ExtractionError::InvalidPath {
            path: expression.to_string(),
            reason: "empty column name".to_string(),
        });
    }

    let record = outcome.rows.get(row).ok_or(ExtractionError::RowOutOfRange {
        row,
        rows: outcome.rows.len(),
    })?;
    record
        .get(column)
        .cloned()
        .ok_or_else(|| ExtractionError::MissingColumn {
            column: column.to_string(),
            row,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
