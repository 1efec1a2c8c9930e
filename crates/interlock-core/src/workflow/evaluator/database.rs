//! Database validation: row and affected-row counts, column values, row
//! predicates, and execution time.

use serde_json::{json, Value};

use interlock_types::domain::{DatabaseOutcome, DatabaseValidation, PredicateScope, RowPredicate};
use interlock_types::result::ValidationResult;

use super::{values_equal, Checks};
use crate::workflow::expression::ExpressionEvaluator;

pub(super) fn validate(
    outcome: &DatabaseOutcome,
    validation: &DatabaseValidation,
) -> ValidationResult {
    let mut checks = Checks::new();
    let rows = outcome.rows.len();

    if let Some(expected) = validation.row_count {
        checks.check(
            rows == expected,
            format!("row count == {expected} (got {rows})"),
        );
    }

    if let Some(expected) = validation.rows_affected {
        checks.check(
            outcome.rows_affected == expected,
            format!(
                "rows affected == {expected} (got {})",
                outcome.rows_affected
            ),
        );
    }

    for column in &validation.columns {
        let name = &column.column;
        let Some(row) = outcome.rows.get(column.row) else {
            checks.fail(format!(
                "row {} out of range ({rows} rows returned)",
                column.row
            ));
            continue;
        };
        match row.get(name) {
            Some(actual) => checks.check(
                values_equal(actual, &column.equals),
                format!(
                    "row {} {name} == {} (got {actual})",
                    column.row, column.equals
                ),
            ),
            None => checks.fail(format!("row {} has no column '{name}'", column.row)),
        }
    }

    if !validation.predicates.is_empty() {
        let evaluator = ExpressionEvaluator::new();
        for predicate in &validation.predicates {
            check_predicate(&evaluator, outcome, predicate, &mut checks);
        }
    }

    if let Some(max) = validation.max_execution_time_ms {
        checks.check(
            outcome.elapsed_ms <= max,
            format!("execution time <= {max}ms (got {}ms)", outcome.elapsed_ms),
        );
    }

    checks.finish()
}

/// Evaluate `predicate` with each row bound as `row` and its position as `index`.
fn check_predicate(
    evaluator: &ExpressionEvaluator,
    outcome: &DatabaseOutcome,
    predicate: &RowPredicate,
    checks: &mut Checks,
) {
    let expression = &predicate.expression;
    let candidates: &[serde_json::Map<String, Value>] = match predicate.scope {
        PredicateScope::First => match outcome.rows.first() {
            Some(_) => &outcome.rows[..1],
            None => {
                checks.fail(format!("first row: {expression} (no rows returned)"));
                return;
            }
        },
        PredicateScope::All | PredicateScope::Any => &outcome.rows,
    };

    let mut matched = 0usize;
    for (index, row) in candidates.iter().enumerate() {
        let context = json!({ "row": row, "index": index });
        match evaluator.evaluate_bool(expression, &context) {
            Ok(true) => matched += 1,
            Ok(false) => {}
            Err(e) => {
                checks.fail(format!("{expression}: {e}"));
                return;
            }
        }
    }

    let total = candidates.len();
    match predicate.scope {
        PredicateScope::All => checks.check(
            matched == total,
            format!("all rows: {expression} ({matched}/{total} matched)"),
        ),
        PredicateScope::Any => checks.check(
            matched > 0,
            format!("any row: {expression} ({matched}/{total} matched)"),
        ),
        PredicateScope::First => {
            checks.check(matched == 1, format!("first row: {expression}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlock_types::domain::ColumnExpectation;
    use serde_json::Map;

    fn row(id: i64, email: &str) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(id));
        row.insert("email".to_string(), json!(email));
        row
    }

    fn outcome() -> DatabaseOutcome {
        DatabaseOutcome {
            columns: vec!["id".to_string(), "email".to_string()],
            rows: vec![row(1, "alice@example.com"), row(2, "bob@test.org")],
            rows_affected: 0,
            elapsed_ms: 3,
        }
    }

    fn predicate(expression: &str, scope: PredicateScope) -> RowPredicate {
        RowPredicate {
            expression: expression.to_string(),
            scope,
        }
    }

    #[test]
    fn row_count_and_columns() {
        let validation = DatabaseValidation {
            row_count: Some(2),
            columns: vec![ColumnExpectation {
                row: 1,
                column: "email".to_string(),
                equals: json!("bob@test.org"),
            }],
            max_execution_time_ms: Some(50),
            ..Default::default()
        };
        let result = validate(&outcome(), &validation);
        assert!(result.passed, "{}", result.detail);
    }

    #[test]
    fn wrong_row_count_fails() {
        let validation = DatabaseValidation {
            row_count: Some(1),
            ..Default::default()
        };
        assert!(!validate(&outcome(), &validation).passed);
    }

    #[test]
    fn rows_affected_checks_statements_without_result_set() {
        let deleted = DatabaseOutcome {
            rows_affected: 1,
            ..Default::default()
        };
        let one = DatabaseValidation {
            rows_affected: Some(1),
            ..Default::default()
        };
        assert!(validate(&deleted, &one).passed);

        let none_deleted = DatabaseOutcome::default();
        let result = validate(&none_deleted, &one);
        assert!(!result.passed);
        assert!(result.detail.contains("rows affected == 1 (got 0)"));
    }

    #[test]
    fn predicate_scopes() {
        let all = DatabaseValidation {
            predicates: vec![predicate("row.id > 0", PredicateScope::All)],
            ..Default::default()
        };
        assert!(validate(&outcome(), &all).passed);

        let all_fails = DatabaseValidation {
            predicates: vec![predicate("row.id > 1", PredicateScope::All)],
            ..Default::default()
        };
        assert!(!validate(&outcome(), &all_fails).passed);

        let any = DatabaseValidation {
            predicates: vec![predicate("row.email|endsWith('.org')", PredicateScope::Any)],
            ..Default::default()
        };
        assert!(validate(&outcome(), &any).passed);

        let first = DatabaseValidation {
            predicates: vec![predicate("row.id == 1", PredicateScope::First)],
            ..Default::default()
        };
        assert!(validate(&outcome(), &first).passed);
    }

    #[test]
    fn first_scope_on_empty_result_fails() {
        let validation = DatabaseValidation {
            predicates: vec![predicate("row.id == 1", PredicateScope::First)],
            ..Default::default()
        };
        assert!(!validate(&DatabaseOutcome::default(), &validation).passed);
    }

    #[test]
    fn missing_column_fails() {
        let validation = DatabaseValidation {
            columns: vec![ColumnExpectation {
                row: 0,
                column: "name".to_string(),
                equals: json!("alice"),
            }],
            ..Default::default()
        };
        let result = validate(&outcome(), &validation);
        assert!(!result.passed);
        assert!(result.detail.contains("no column 'name'"));
    }
}
