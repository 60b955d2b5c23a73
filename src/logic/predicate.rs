//! In-memory evaluation of query predicates against items. Used by the
//! in-memory adapter; HTTP backends evaluate the same wire shapes
//! server-side.

use serde_json::Value;

use crate::model::{get_path, Item, Predicate, Wheres};

/// True when the item satisfies every active filter key.
pub fn matches(item: &Item, wheres: &Wheres) -> bool {
    wheres
        .iter()
        .all(|(key, predicate)| predicate_matches(item, Some(key.as_str()), predicate))
}

/// Evaluate one predicate. `scope` is the field the predicate applies to;
/// a `Fields` map rebinds the scope per entry, `Or` passes it through.
fn predicate_matches(item: &Item, scope: Option<&str>, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Fields(fields) => fields
            .iter()
            .all(|(field, p)| predicate_matches(item, Some(field.as_str()), p)),
        Predicate::Or { or } => or.iter().any(|p| predicate_matches(item, scope, p)),
        Predicate::Like { like } => {
            let Some(field) = scope else { return false };
            match get_path(item, field) {
                Some(Value::String(s)) => s.to_lowercase().contains(&like.to_lowercase()),
                Some(Value::Number(n)) => n.to_string().contains(like.as_str()),
                _ => false,
            }
        }
        Predicate::Eq(expected) => {
            let Some(field) = scope else { return false };
            match get_path(item, field) {
                Some(actual) => loose_eq(actual, expected),
                None => false,
            }
        }
    }
}

/// Equality tolerant of string/number encoding mismatches, so a filter
/// `{"userId": "7"}` matches a record carrying `"userId": 7`.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
