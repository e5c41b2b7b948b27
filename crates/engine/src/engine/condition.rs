//! Condition step evaluation

use serde_json::Value;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::model::{Condition, ConditionOperator};

/// A condition that cannot be evaluated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

/// A condition with its operator parsed and its target checked
#[derive(Debug, Clone)]
struct ParsedCondition<'a> {
    field: &'a str,
    operator: ConditionOperator,
    expected: Option<&'a Value>,
    next_step_id: Uuid,
}

fn parse(index: usize, condition: &Condition) -> Result<ParsedCondition<'_>, ConditionError> {
    let malformed = |reason: String| ConditionError::Malformed { index, reason };

    if condition.field.trim().is_empty() {
        return Err(malformed("field is empty".to_string()));
    }
    let operator: ConditionOperator = condition.operator.parse().map_err(malformed)?;
    let expected = condition.value.as_ref().filter(|v| !v.is_null());
    if operator.needs_value() && expected.is_none() {
        return Err(malformed(format!(
            "operator {} requires a value",
            operator.as_str()
        )));
    }
    let next_step_id = condition
        .next_step_id
        .ok_or_else(|| malformed("next_step_id is missing".to_string()))?;

    Ok(ParsedCondition {
        field: &condition.field,
        operator,
        expected,
        next_step_id,
    })
}

/// Pick the branch target of the first matching condition
///
/// Every condition is validated before any is evaluated, so a malformed
/// entry fails the step even when an earlier one would have matched.
/// `Ok(None)` means nothing matched and the next step in order runs.
pub fn evaluate(
    conditions: &[Condition],
    context: &ExecutionContext,
) -> Result<Option<Uuid>, ConditionError> {
    let parsed = conditions
        .iter()
        .enumerate()
        .map(|(index, condition)| parse(index, condition))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parsed
        .into_iter()
        .find(|c| matches(c.operator, context.resolve(c.field), c.expected))
        .map(|c| c.next_step_id))
}

/// Apply one operator to a resolved field
pub fn matches(operator: ConditionOperator, actual: Option<&Value>, expected: Option<&Value>) -> bool {
    let actual = actual.filter(|v| !v.is_null());
    match operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::NotExists => actual.is_none(),
        ConditionOperator::Equals => both(actual, expected, loose_eq),
        ConditionOperator::NotEquals => !both(actual, expected, loose_eq),
        ConditionOperator::Contains => both(actual, expected, contains),
        ConditionOperator::NotContains => !both(actual, expected, contains),
        ConditionOperator::GreaterThan => both(actual, expected, |a, b| {
            compare(a, b).is_some_and(|o| o.is_gt())
        }),
        ConditionOperator::LessThan => both(actual, expected, |a, b| {
            compare(a, b).is_some_and(|o| o.is_lt())
        }),
    }
}

fn both(actual: Option<&Value>, expected: Option<&Value>, f: impl Fn(&Value, &Value) -> bool) -> bool {
    match (actual, expected) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// Equality that tolerates `"5"` vs `5` and `"true"` vs `true`
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return x == y;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => scalar_text(needle).is_some_and(|n| s.contains(n.as_str())),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    number(a)?.partial_cmp(&number(b)?)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
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
