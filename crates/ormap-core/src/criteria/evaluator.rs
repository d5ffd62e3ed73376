//! In-memory evaluation of criteria leaves.

use std::cmp::Ordering;

use ormap_proto::{Record, Value};

use super::criteria::ComparisonOp;
use super::field::QueryField;
use crate::error::{Error, Result};

/// Something criteria can read property values from.
pub trait PropertyLookup {
    /// Value of `field`, or `None` when the field is unknown.
    fn lookup(&self, field: &QueryField) -> Option<Value>;
}

impl PropertyLookup for Record {
    /// Dotted paths are looked up verbatim, so related values fetched by a
    /// store (keyed `Car.Make`) are found as well as own properties.
    fn lookup(&self, field: &QueryField) -> Option<Value> {
        self.get(&field.path.to_string())
            .or_else(|| {
                if field.is_prepared() && !field.path.has_hops() {
                    self.get(&field.field_name)
                } else {
                    None
                }
            })
            .cloned()
    }
}

/// Apply a comparison operator. A missing field is treated as `Null`.
pub fn compare(actual: &Value, op: ComparisonOp, expected: &Value) -> Result<bool> {
    let matched = match op {
        ComparisonOp::Equals => values_equal(actual, expected),
        ComparisonOp::NotEquals => !values_equal(actual, expected),
        ComparisonOp::GreaterThan => compare_values(actual, expected) == Some(Ordering::Greater),
        ComparisonOp::GreaterThanEqual => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOp::LessThan => compare_values(actual, expected) == Some(Ordering::Less),
        ComparisonOp::LessThanEqual => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ComparisonOp::Like => like_value(actual, expected)?,
        ComparisonOp::NotLike => !like_value(actual, expected)?,
        ComparisonOp::Is => actual.is_null(),
        ComparisonOp::IsNot => !actual.is_null(),
        ComparisonOp::In => match expected {
            Value::List(items) => items.iter().any(|item| values_equal(actual, item)),
            single => values_equal(actual, single),
        },
    };
    Ok(matched)
}

fn like_value(actual: &Value, pattern: &Value) -> Result<bool> {
    let pattern = pattern.as_str().ok_or_else(|| {
        Error::developer(format!("LIKE requires a string pattern, got {}", pattern))
    })?;
    let text = match actual {
        Value::Null => return Ok(false),
        Value::String(s) => s.clone(),
        other => other.to_key_string(),
    };
    Ok(like_match(&text.to_lowercase(), &pattern.to_lowercase()))
}

/// Equality with numeric widening, and string-to-timestamp/uuid coercion for
/// unprepared literals.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int32(a), Value::Int32(b)) => a == b,
        (Value::Int64(a), Value::Int64(b)) => a == b,
        (Value::Int32(a), Value::Int64(b)) => (*a as i64) == *b,
        (Value::Int64(a), Value::Int32(b)) => *a == (*b as i64),
        (Value::Float64(a), Value::Float64(b)) => a == b,
        (Value::Float64(_), Value::Int32(_) | Value::Int64(_))
        | (Value::Int32(_) | Value::Int64(_), Value::Float64(_)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
        (Value::Uuid(a), Value::Uuid(b)) => a == b,
        (Value::Timestamp(_) | Value::Uuid(_), Value::String(s)) => coerce_like(a, s)
            .map(|coerced| values_equal(a, &coerced))
            .unwrap_or(false),
        (Value::String(s), Value::Timestamp(_) | Value::Uuid(_)) => coerce_like(b, s)
            .map(|coerced| values_equal(&coerced, b))
            .unwrap_or(false),
        _ => false,
    }
}

/// Ordering between compatible values; `None` for incompatible types.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Int32(a), Value::Int64(b)) => Some((*a as i64).cmp(b)),
        (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&(*b as i64))),
        (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
        (Value::Float64(_), Value::Int32(_) | Value::Int64(_))
        | (Value::Int32(_) | Value::Int64(_), Value::Float64(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        (Value::Timestamp(_), Value::String(s)) => compare_values(a, &coerce_like(a, s)?),
        (Value::String(s), Value::Timestamp(_)) => compare_values(&coerce_like(b, s)?, b),
        _ => None,
    }
}

/// Parse `text` into the same variant as `template`.
fn coerce_like(template: &Value, text: &str) -> Option<Value> {
    match template {
        Value::Timestamp(_) => Value::parse_timestamp(text).ok(),
        Value::Uuid(_) => Value::parse_uuid(text).ok(),
        _ => None,
    }
}

/// SQL LIKE matching: `%` matches any run, `_` one character, `\` escapes.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let mut chars = value.chars().peekable();
    let mut pattern_chars = pattern.chars().peekable();

    like_match_recursive(&mut chars, &mut pattern_chars)
}

fn like_match_recursive(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    pattern: &mut std::iter::Peekable<std::str::Chars>,
) -> bool {
    loop {
        match (pattern.peek().copied(), chars.peek().copied()) {
            (None, None) => return true,
            (None, Some(_)) => return false,
            (Some('%'), _) => {
                pattern.next();
                if pattern.peek().is_none() {
                    return true;
                }
                loop {
                    let mut pattern_clone = pattern.clone();
                    let mut chars_clone = chars.clone();
                    if like_match_recursive(&mut chars_clone, &mut pattern_clone) {
                        return true;
                    }
                    if chars.next().is_none() {
                        return false;
                    }
                }
            }
            (Some('_'), Some(_)) => {
                pattern.next();
                chars.next();
            }
            (Some('_'), None) => return false,
            (Some('\\'), _) => {
                pattern.next();
                match (pattern.peek().copied(), chars.peek().copied()) {
                    (Some(p), Some(c)) if p == c => {
                        pattern.next();
                        chars.next();
                    }
                    _ => return false,
                }
            }
            (Some(p), Some(c)) => {
                if p != c {
                    return false;
                }
                pattern.next();
                chars.next();
            }
            (Some(_), None) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_widens_numbers() {
        assert!(values_equal(&Value::Int32(5), &Value::Int64(5)));
        assert!(values_equal(&Value::Float64(5.0), &Value::Int32(5)));
        assert!(!values_equal(&Value::Int32(5), &Value::String("5".into())));
        assert!(values_equal(&Value::Null, &Value::Null));
    }

    #[test]
    fn test_ordering_of_incompatible_types_is_false() {
        let actual = Value::String("abc".into());
        assert!(!compare(&actual, ComparisonOp::GreaterThan, &Value::Int32(1)).unwrap());
        assert!(!compare(&actual, ComparisonOp::LessThan, &Value::Int32(1)).unwrap());
    }

    #[test]
    fn test_timestamp_against_unprepared_string() {
        let actual = Value::parse_timestamp("2021-06-01").unwrap();
        let expected = Value::String("2021-01-01".into());
        assert!(compare(&actual, ComparisonOp::GreaterThan, &expected).unwrap());
        assert!(!compare(&actual, ComparisonOp::Equals, &expected).unwrap());
    }

    #[test]
    fn test_null_semantics() {
        let null = Value::Null;
        let smith = Value::String("Smith".into());
        assert!(compare(&null, ComparisonOp::Is, &Value::Null).unwrap());
        assert!(!compare(&smith, ComparisonOp::Is, &Value::Null).unwrap());
        assert!(compare(&smith, ComparisonOp::IsNot, &Value::Null).unwrap());
        assert!(compare(&null, ComparisonOp::NotEquals, &smith).unwrap());
        assert!(compare(&null, ComparisonOp::NotLike, &Value::from("S%")).unwrap());
        assert!(!compare(&null, ComparisonOp::Like, &Value::from("%")).unwrap());
    }

    #[test]
    fn test_in_list() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert!(compare(&Value::Int32(2), ComparisonOp::In, &list).unwrap());
        assert!(!compare(&Value::Int32(4), ComparisonOp::In, &list).unwrap());
    }

    #[test]
    fn test_like_patterns() {
        assert!(like_match("smith", "sm%"));
        assert!(like_match("smith", "%ith"));
        assert!(like_match("smith", "s_ith"));
        assert!(!like_match("smith", "s_th"));
        assert!(like_match("50%", "50\\%"));
        assert!(!like_match("500", "50\\%"));
        assert!(compare(
            &Value::from("Smith"),
            ComparisonOp::Like,
            &Value::from("SM%")
        )
        .unwrap());
    }

    #[test]
    fn test_like_requires_string_pattern() {
        let err = compare(&Value::from("x"), ComparisonOp::Like, &Value::Int32(1)).unwrap_err();
        assert!(matches!(err, Error::Developer(_)));
    }
}
