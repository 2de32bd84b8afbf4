//! Type coercion with ajv v6 semantics.

use serde_json::Value;

use super::record::{js_number, number_value};
use crate::canonical::InstanceType;
use crate::config::Coercion;

/// Whether `value` is an instance of `ty`.
pub fn is_type(value: &Value, ty: InstanceType) -> bool {
    match ty {
        InstanceType::String => value.is_string(),
        InstanceType::Number => value.is_number(),
        InstanceType::Integer => is_integer(value),
        InstanceType::Boolean => value.is_boolean(),
        InstanceType::Array => value.is_array(),
        InstanceType::Object => value.is_object(),
        InstanceType::Null => value.is_null(),
    }
}

pub fn matches_any(value: &Value, types: &[InstanceType]) -> bool {
    types.iter().any(|ty| is_type(value, *ty))
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

/// Try to convert `value` into one of `types`, first match wins.
/// Returns `None` when no conversion applies.
pub fn coerce(value: &Value, types: &[InstanceType], mode: Coercion) -> Option<Value> {
    if !mode.enabled() {
        return None;
    }

    let mut source = value;
    if mode == Coercion::Array && !types.contains(&InstanceType::Array) {
        if let Value::Array(items) = value {
            if let [only] = items.as_slice() {
                if matches_any(only, types) {
                    return Some(only.clone());
                }
                source = only;
            }
        }
    }

    types.iter().find_map(|ty| coerce_to(source, *ty, mode))
}

fn coerce_to(value: &Value, ty: InstanceType, mode: Coercion) -> Option<Value> {
    match (ty, value) {
        (InstanceType::String, Value::Number(n)) => Some(Value::String(js_number(n))),
        (InstanceType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (InstanceType::String, Value::Null) => Some(Value::String(String::new())),

        (InstanceType::Number, Value::String(s)) => parse_number(s).map(number_value),
        (InstanceType::Integer, Value::String(s)) => {
            parse_number(s).filter(|f| f.fract() == 0.0).map(number_value)
        }
        (InstanceType::Number | InstanceType::Integer, Value::Bool(b)) => {
            Some(Value::from(u8::from(*b)))
        }
        (InstanceType::Number | InstanceType::Integer, Value::Null) => Some(Value::from(0)),

        (InstanceType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (InstanceType::Boolean, Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        (InstanceType::Boolean, Value::Null) => Some(Value::Bool(false)),

        (InstanceType::Null, Value::String(s)) if s.is_empty() => Some(Value::Null),
        (InstanceType::Null, Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        (InstanceType::Null, Value::Bool(false)) => Some(Value::Null),

        (InstanceType::Array, scalar) if mode == Coercion::Array => match scalar {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
                Some(Value::Array(vec![scalar.clone()]))
            }
            _ => None,
        },

        _ => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use InstanceType as T;

    #[test]
    fn test_scalar_coercions() {
        let mode = Coercion::Scalars;
        assert_eq!(coerce(&json!("12"), &[T::Integer], mode), Some(json!(12)));
        assert_eq!(coerce(&json!("1.5"), &[T::Integer], mode), None);
        assert_eq!(coerce(&json!("1.5"), &[T::Number], mode), Some(json!(1.5)));
        assert_eq!(coerce(&json!(1), &[T::String], mode), Some(json!("1")));
        assert_eq!(coerce(&json!(2.0), &[T::String], mode), Some(json!("2")));
        assert_eq!(
            coerce(&json!(1e20), &[T::String], mode),
            Some(json!("100000000000000000000"))
        );
        assert_eq!(coerce(&json!("true"), &[T::Boolean], mode), Some(json!(true)));
        assert_eq!(coerce(&json!("yes"), &[T::Boolean], mode), None);
        assert_eq!(coerce(&json!(""), &[T::Null], mode), Some(json!(null)));
        assert_eq!(coerce(&json!(null), &[T::Number], mode), Some(json!(0)));
        assert_eq!(coerce(&json!("abc"), &[T::Number], mode), None);
    }

    #[test]
    fn test_types_tried_in_order() {
        assert_eq!(
            coerce(&json!("1"), &[T::Boolean, T::Integer], Coercion::Scalars),
            Some(json!(1))
        );
        assert_eq!(
            coerce(&json!(1), &[T::Boolean, T::Integer], Coercion::Scalars),
            Some(json!(true))
        );
    }

    #[test]
    fn test_array_mode_wraps_and_unwraps() {
        let mode = Coercion::Array;
        assert_eq!(coerce(&json!("a"), &[T::Array], mode), Some(json!(["a"])));
        assert_eq!(coerce(&json!(["7"]), &[T::Integer], mode), Some(json!(7)));
        assert_eq!(coerce(&json!([7]), &[T::Integer], mode), Some(json!(7)));
        assert_eq!(coerce(&json!("a"), &[T::Array], Coercion::Scalars), None);
    }

    #[test]
    fn test_off_never_coerces() {
        assert_eq!(coerce(&json!("12"), &[T::Integer], Coercion::Off), None);
    }

    #[test]
    fn test_integer_check() {
        assert!(is_type(&json!(3), T::Integer));
        assert!(is_type(&json!(3.0), T::Integer));
        assert!(!is_type(&json!(3.5), T::Integer));
        assert!(is_type(&json!(3), T::Number));
    }
}
