//! Branch condition evaluation.
//!
//! A branch's condition list is folded strictly left to right: the first
//! result seeds the accumulator and every later condition combines with it
//! through its *own* `logic` field (`OR`, otherwise `AND`). There is no
//! precedence and no grouping, so `[A, B(OR), C]` means `(A || B) && C`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use db::models::Record;
use db::Store;
use nodes::ExecutionContext;

use crate::models::{Condition, ConditionField, ConditionOperator, Logic};

#[derive(Clone)]
pub struct ConditionEvaluator {
    store: Arc<dyn Store>,
}

impl ConditionEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Evaluate a branch's conditions against a fresh read of the record.
    ///
    /// A record that can't be read (deleted, or the store failed) makes the
    /// branch evaluate to `false`. An empty list is `false` as well.
    pub async fn evaluate_branch(&self, conditions: &[Condition], ctx: &ExecutionContext) -> bool {
        if conditions.is_empty() {
            return false;
        }

        let record = match self.store.get_record(ctx.tenant_id, ctx.record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(record_id = %ctx.record_id, "record vanished; branch evaluates to false");
                return false;
            }
            Err(e) => {
                warn!(record_id = %ctx.record_id, error = %e, "record read failed; branch evaluates to false");
                return false;
            }
        };

        fold_conditions(&record, conditions)
    }
}

/// Left-to-right fold over already-loaded record state.
pub fn fold_conditions(record: &Record, conditions: &[Condition]) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return false;
    };

    let mut acc = evaluate_single(record, first);
    for condition in iter {
        let result = evaluate_single(record, condition);
        acc = match condition.logic {
            Logic::Or => acc || result,
            Logic::And | Logic::Other => acc && result,
        };
    }
    acc
}

/// Evaluate one predicate. Unsupported field/operator pairs are `false`.
pub fn evaluate_single(record: &Record, condition: &Condition) -> bool {
    use ConditionField as F;
    use ConditionOperator as Op;

    let value = &condition.value;
    match (condition.field, condition.operator) {
        (F::Status, Op::Equals) => id_matches(record.status_id, value),
        (F::Status, Op::NotEquals) => !id_matches(record.status_id, value),

        (F::Temperature, Op::Equals) => temperature_matches(record, value),
        (F::Temperature, Op::NotEquals) => !temperature_matches(record, value),

        (F::IsComplete, Op::Equals) => as_bool(value) == Some(record.is_complete),

        (F::HasTag, Op::Equals | Op::Contains) => contains_id(&record.tag_ids, value),
        (F::HasTag, Op::NotEquals | Op::NotContains) => !contains_id(&record.tag_ids, value),

        (F::HasMotivation, Op::Equals | Op::Contains) => contains_id(&record.motivation_ids, value),
        (F::HasMotivation, Op::NotEquals | Op::NotContains) => !contains_id(&record.motivation_ids, value),

        (F::IsAssigned, Op::Equals) => assignment_matches(record.assigned_to_id, value),

        _ => false,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn as_uuid(value: &Value) -> Option<Uuid> {
    as_str(value).and_then(|s| Uuid::parse_str(s).ok())
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_matches(actual: Option<Uuid>, expected: &Value) -> bool {
    matches!((actual, as_uuid(expected)), (Some(a), Some(e)) if a == e)
}

fn temperature_matches(record: &Record, expected: &Value) -> bool {
    matches!((record.temperature, as_str(expected)), (Some(t), Some(e)) if t.as_str() == e)
}

fn contains_id(set: &std::collections::BTreeSet<Uuid>, expected: &Value) -> bool {
    as_uuid(expected).is_some_and(|id| set.contains(&id))
}

fn assignment_matches(assigned: Option<Uuid>, expected: &Value) -> bool {
    match as_str(expected) {
        Some("any") => assigned.is_some(),
        Some("none") => assigned.is_none(),
        _ => id_matches(assigned, expected),
    }
}
