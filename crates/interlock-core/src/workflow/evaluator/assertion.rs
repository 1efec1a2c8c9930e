//! Path assertions shared by the API and Custom evaluators.

use serde_json::Value;

use interlock_types::domain::{JsonType, PathAssertion};

use super::Checks;
use crate::workflow::extract::lookup_path;

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => actual == expected,
    }
}

fn value_contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

/// Evaluate one assertion against `root`, adding a line per populated field.
pub fn check_path_assertion(root: &Value, assertion: &PathAssertion, checks: &mut Checks) {
    let path = &assertion.path;
    let value = match lookup_path(root, path) {
        Ok(value) => value,
        Err(e) => {
            checks.fail(e.to_string());
            return;
        }
    };

    let mut any = false;

    if let Some(expected) = &assertion.equals {
        any = true;
        checks.check(
            values_equal(value, expected),
            format!("{path} == {expected} (got {value})"),
        );
    }
    if let Some(unexpected) = &assertion.not_equals {
        any = true;
        checks.check(
            !values_equal(value, unexpected),
            format!("{path} != {unexpected} (got {value})"),
        );
    }
    if let Some(needle) = &assertion.contains {
        any = true;
        checks.check(
            value_contains(value, needle),
            format!("{path} contains {needle} (got {value})"),
        );
    }
    if assertion.not_null {
        any = true;
        checks.check(!value.is_null(), format!("{path} is not null"));
    }
    if let Some(bound) = assertion.greater_than {
        any = true;
        checks.check(
            value.as_f64().is_some_and(|n| n > bound),
            format!("{path} > {bound} (got {value})"),
        );
    }
    if let Some(bound) = assertion.less_than {
        any = true;
        checks.check(
            value.as_f64().is_some_and(|n| n < bound),
            format!("{path} < {bound} (got {value})"),
        );
    }
    if let Some(expected) = assertion.type_of {
        any = true;
        let actual = JsonType::of(value);
        checks.check(
            actual == expected,
            format!("{path} is {expected:?} (got {actual:?})"),
        );
    }

    if !any {
        checks.check(true, format!("{path} resolves"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(root: &Value, assertion: PathAssertion) -> bool {
        let mut checks = Checks::new();
        check_path_assertion(root, &assertion, &mut checks);
        checks.finish().passed
    }

    fn at(path: &str) -> PathAssertion {
        PathAssertion {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn numeric_equality_ignores_representation() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({ "a": [1, 2] }), &json!({ "a": [1.0, 2.0] })));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn assertion_kinds() {
        let root = json!({ "body": { "id": 5, "name": "alice", "tags": ["x"], "gone": null } });
        assert!(run(&root, PathAssertion { equals: Some(json!(5)), ..at("body.id") }));
        assert!(run(&root, PathAssertion { not_equals: Some(json!(6)), ..at("body.id") }));
        assert!(run(&root, PathAssertion { contains: Some(json!("lic")), ..at("body.name") }));
        assert!(run(&root, PathAssertion { contains: Some(json!("x")), ..at("body.tags") }));
        assert!(run(&root, PathAssertion { contains: Some(json!("id")), ..at("body") }));
        assert!(run(&root, PathAssertion { greater_than: Some(4.0), less_than: Some(6.0), ..at("body.id") }));
        assert!(run(&root, PathAssertion { type_of: Some(JsonType::Array), ..at("body.tags") }));
        assert!(!run(&root, PathAssertion { not_null: true, ..at("body.gone") }));
        assert!(run(&root, at("body.gone")));
    }

    #[test]
    fn unresolvable_path_fails() {
        let root = json!({ "body": {} });
        assert!(!run(&root, at("body.id")));
    }

    #[test]
    fn comparisons_on_non_numbers_fail() {
        let root = json!({ "v": "10" });
        assert!(!run(&root, PathAssertion { greater_than: Some(1.0), ..at("v") }));
    }
}
