//! Property type definitions and literal conversion.

use ormap_proto::{format_timestamp, Error, Value};

/// Semantic type of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    /// UTF-8 string.
    String,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Boolean value.
    Bool,
    /// Date and time (microseconds since Unix epoch).
    DateTime,
    /// UUID (128-bit identifier).
    Guid,
}

impl PropType {
    /// Name used in conversion errors.
    pub fn name(&self) -> &'static str {
        match self {
            PropType::String => "string",
            PropType::Int32 => "int32",
            PropType::Int64 => "int64",
            PropType::Float64 => "float64",
            PropType::Bool => "bool",
            PropType::DateTime => "datetime",
            PropType::Guid => "guid",
        }
    }

    /// Convert a value into this type's representation.
    ///
    /// `Null` passes through unchanged and lists convert element-wise. For
    /// `DateTime`, the text sentinels `Today` and `Now` (any case) resolve to the
    /// current day's midnight and the current instant at the time of the call.
    pub fn convert(&self, value: &Value) -> Result<Value, Error> {
        if let Value::List(items) = value {
            return items
                .iter()
                .map(|item| self.convert(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }
        if value.is_null() {
            return Ok(Value::Null);
        }

        let converted = match (self, value) {
            (PropType::String, Value::String(_)) => Some(value.clone()),
            (PropType::String, Value::Timestamp(t)) => Some(Value::String(format_timestamp(*t))),
            (PropType::String, other) => Some(Value::String(other.to_key_string())),

            (PropType::Int32, Value::Int32(_)) => Some(value.clone()),
            (PropType::Int32, Value::Int64(i)) => i32::try_from(*i).ok().map(Value::Int32),
            (PropType::Int32, Value::Float64(f)) => {
                whole_float(*f).and_then(|i| i32::try_from(i).ok()).map(Value::Int32)
            }
            (PropType::Int32, Value::String(s)) => s.trim().parse().ok().map(Value::Int32),

            (PropType::Int64, Value::Int32(i)) => Some(Value::Int64(*i as i64)),
            (PropType::Int64, Value::Int64(_)) => Some(value.clone()),
            (PropType::Int64, Value::Float64(f)) => whole_float(*f).map(Value::Int64),
            (PropType::Int64, Value::String(s)) => s.trim().parse().ok().map(Value::Int64),

            (PropType::Float64, Value::String(s)) => s.trim().parse().ok().map(Value::Float64),
            (PropType::Float64, other) => other.as_f64().map(Value::Float64),

            (PropType::Bool, Value::Bool(_)) => Some(value.clone()),
            (PropType::Bool, Value::Int32(i)) if *i == 0 || *i == 1 => Some(Value::Bool(*i == 1)),
            (PropType::Bool, Value::Int64(i)) if *i == 0 || *i == 1 => Some(Value::Bool(*i == 1)),
            (PropType::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool),

            (PropType::DateTime, Value::Timestamp(_)) => Some(value.clone()),
            (PropType::DateTime, Value::String(s)) => {
                let text = s.trim();
                if text.eq_ignore_ascii_case("today") {
                    Some(Value::today())
                } else if text.eq_ignore_ascii_case("now") {
                    Some(Value::now())
                } else {
                    return Value::parse_timestamp(text);
                }
            }

            (PropType::Guid, Value::Uuid(_)) => Some(value.clone()),
            (PropType::Guid, Value::String(s)) => return Value::parse_uuid(s),

            _ => None,
        };

        converted.ok_or_else(|| Error::Conversion {
            value: value.to_string(),
            target: self.name(),
        })
    }
}

/// The float as an `i64` when it is whole and in range.
fn whole_float(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
