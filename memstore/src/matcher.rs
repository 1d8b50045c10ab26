use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::compare::{as_f64, as_i64, compare, equal};
use crate::error::{Error, Result};

/// Resolve a dotted path such as `address.city` or `tags.0`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Test a document against a selector. All conditions must hold.
pub fn matches(document: &Document, selector: &Document) -> Result<bool> {
    for (field, condition) in selector {
        if !matches_condition(lookup(document, field), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_document(condition: &Document) -> bool {
    !condition.is_empty() && condition.keys().all(|k| k.starts_with('$'))
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !evaluate(value, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(equals_or_contains(value, expected)),
    }
}

// A missing field equals null; an array equals a value it contains.
fn equals_or_contains(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) => {
            items.iter().any(|item| equal(item, expected))
                || matches!(expected, Bson::Array(other) if other == items)
        }
        Some(value) => equal(value, expected),
    }
}

fn satisfies_ordering(
    value: Option<&Bson>,
    operand: &Bson,
    accept: fn(Ordering) -> bool,
) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare(item, operand).is_some_and(accept)),
        Some(value) => compare(value, operand).is_some_and(accept),
        None => false,
    }
}

fn operand_list<'a>(operator: &str, operand: &'a Bson) -> Result<&'a [Bson]> {
    match operand {
        Bson::Array(items) => Ok(items.as_slice()),
        other => Err(Error::InvalidSelector(format!(
            "{operator} expects an array, got {other}"
        ))),
    }
}

fn evaluate(value: Option<&Bson>, operator: &str, operand: &Bson) -> Result<bool> {
    Ok(match operator {
        "$eq" => equals_or_contains(value, operand),
        "$ne" => !equals_or_contains(value, operand),
        "$gt" => satisfies_ordering(value, operand, Ordering::is_gt),
        "$gte" => satisfies_ordering(value, operand, Ordering::is_ge),
        "$lt" => satisfies_ordering(value, operand, Ordering::is_lt),
        "$lte" => satisfies_ordering(value, operand, Ordering::is_le),
        "$in" => operand_list(operator, operand)?
            .iter()
            .any(|candidate| equals_or_contains(value, candidate)),
        "$nin" => !operand_list(operator, operand)?
            .iter()
            .any(|candidate| equals_or_contains(value, candidate)),
        "$all" => {
            let required = operand_list(operator, operand)?;
            match value {
                Some(Bson::Array(items)) => required
                    .iter()
                    .all(|r| items.iter().any(|item| equal(item, r))),
                _ => false,
            }
        }
        "$size" => {
            let size = as_i64(operand).ok_or_else(|| {
                Error::InvalidSelector(format!("$size expects an integer, got {operand}"))
            })?;
            matches!(value, Some(Bson::Array(items)) if items.len() as i64 == size)
        }
        "$exists" => {
            let wanted = match operand {
                Bson::Boolean(b) => *b,
                other => as_f64(other).is_some_and(|n| n != 0.0),
            };
            value.is_some() == wanted
        }
        "$mod" => {
            let (divisor, remainder) = match operand_list(operator, operand)? {
                [divisor, remainder] => match (as_i64(divisor), as_i64(remainder)) {
                    (Some(d), Some(r)) if d != 0 => (d, r),
                    _ => {
                        return Err(Error::InvalidSelector(format!(
                            "$mod expects [divisor, remainder], got {operand}"
                        )))
                    }
                },
                _ => {
                    return Err(Error::InvalidSelector(format!(
                        "$mod expects [divisor, remainder], got {operand}"
                    )))
                }
            };
            value
                .and_then(|v| as_i64(v).or_else(|| as_f64(v).map(|f| f as i64)))
                .is_some_and(|n| n.wrapping_rem(divisor) == remainder)
        }
        unknown => return Err(Error::InvalidSelector(format!("unknown operator {unknown}"))),
    })
}
