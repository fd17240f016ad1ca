#![deny(missing_docs)]

//! # Value Casting
//!
//! Fallible conversion of externally supplied values (defaults, enum values,
//! examples, rule payloads) to a parameter's declared type. A failed cast is
//! `None`; callers log and skip the value.

use crate::params::node::NodeId;
use crate::params::operation::Operation;
use crate::params::types::ParameterType;
use serde_json::{Number, Value as JsonValue};

/// Casts `value` to `target`, returning `None` when no sensible conversion exists.
pub fn cast_value(target: ParameterType, value: &JsonValue) -> Option<JsonValue> {
    match target {
        ParameterType::Null => match value {
            JsonValue::Null => Some(JsonValue::Null),
            JsonValue::String(s) if s.trim() == "null" => Some(JsonValue::Null),
            _ => None,
        },
        ParameterType::Boolean => match value {
            JsonValue::Bool(b) => Some(JsonValue::Bool(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(JsonValue::Bool(true)),
                "false" => Some(JsonValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ParameterType::Integer => match value {
            JsonValue::Number(n) => number_to_integer(n),
            JsonValue::String(s) => parse_integer(s.trim()),
            _ => None,
        },
        ParameterType::Number => match value {
            JsonValue::Number(n) => Some(JsonValue::Number(n.clone())),
            JsonValue::String(s) => parse_number(s.trim()),
            _ => None,
        },
        ParameterType::String => match value {
            JsonValue::String(s) => Some(JsonValue::String(s.clone())),
            JsonValue::Number(n) => Some(JsonValue::String(n.to_string())),
            JsonValue::Bool(b) => Some(JsonValue::String(b.to_string())),
            _ => None,
        },
        ParameterType::Array => match value {
            JsonValue::Array(_) => Some(value.clone()),
            JsonValue::Object(_) => None,
            scalar => Some(JsonValue::Array(vec![scalar.clone()])),
        },
        ParameterType::Object => match value {
            JsonValue::Object(_) => Some(value.clone()),
            JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
                Ok(parsed @ JsonValue::Object(_)) => Some(parsed),
                _ => None,
            },
            _ => None,
        },
        ParameterType::AllOf
        | ParameterType::AnyOf
        | ParameterType::OneOf
        | ParameterType::Unknown => Some(value.clone()),
    }
}

/// Casts `value` to the declared type of a node.
///
/// Array values additionally have their items cast to the reference
/// element's type.
pub fn cast_to_node(op: &Operation, id: NodeId, value: &JsonValue) -> Option<JsonValue> {
    let node = op.node(id)?;
    let cast = cast_value(node.schema_type(), value)?;
    if let (crate::params::node::NodeKind::Array(array), JsonValue::Array(items)) =
        (node.kind(), &cast)
    {
        let items = items
            .iter()
            .map(|item| cast_to_node(op, array.reference_element, item))
            .collect::<Option<Vec<_>>>()?;
        return Some(JsonValue::Array(items));
    }
    Some(cast)
}

fn number_to_integer(n: &Number) -> Option<JsonValue> {
    if n.is_i64() || n.is_u64() {
        return Some(JsonValue::Number(n.clone()));
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(JsonValue::from(f as i64))
    } else {
        None
    }
}

fn parse_integer(s: &str) -> Option<JsonValue> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(JsonValue::from(i));
    }
    let f = s.parse::<f64>().ok()?;
    number_to_integer(&Number::from_f64(f)?)
}

fn parse_number(s: &str) -> Option<JsonValue> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(JsonValue::from(i));
    }
    let f = s.parse::<f64>().ok()?;
    Number::from_f64(f).map(JsonValue::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cast_numbers() {
        assert_eq!(cast_value(ParameterType::Integer, &json!("42")), Some(json!(42)));
        assert_eq!(cast_value(ParameterType::Integer, &json!(3.0)), Some(json!(3)));
        assert_eq!(cast_value(ParameterType::Integer, &json!(3.5)), None);
        assert_eq!(cast_value(ParameterType::Number, &json!("2.5")), Some(json!(2.5)));
        assert_eq!(cast_value(ParameterType::Number, &json!("abc")), None);
    }

    #[test]
    fn test_cast_booleans_and_strings() {
        assert_eq!(cast_value(ParameterType::Boolean, &json!("TRUE")), Some(json!(true)));
        assert_eq!(cast_value(ParameterType::Boolean, &json!(1)), None);
        assert_eq!(cast_value(ParameterType::String, &json!(12)), Some(json!("12")));
        assert_eq!(cast_value(ParameterType::String, &json!({"a": 1})), None);
    }

    #[test]
    fn test_cast_structured() {
        assert_eq!(cast_value(ParameterType::Array, &json!(1)), Some(json!([1])));
        assert_eq!(
            cast_value(ParameterType::Object, &json!("{\"a\":1}")),
            Some(json!({"a": 1}))
        );
        assert_eq!(cast_value(ParameterType::Object, &json!([1])), None);
    }
}
