use domain::{AttributeType, AttributeValue};
use serde_json::Value;

use crate::NormalizeError;

/// 按属性声明类型转换值。
///
/// `Null` 无法转换为任何具体类型；未识别的类型原样透传。
pub fn coerce(value: &Value, target: &AttributeType) -> Result<AttributeValue, NormalizeError> {
    match target {
        AttributeType::Float => to_float(value).map(AttributeValue::Float),
        AttributeType::Int => to_int(value).map(AttributeValue::Int),
        AttributeType::Bool => to_bool(value).map(AttributeValue::Bool),
        AttributeType::String => match value {
            Value::Null => Err(conversion_error(value, "string")),
            Value::String(text) => Ok(AttributeValue::String(text.clone())),
            other => Ok(AttributeValue::String(other.to_string())),
        },
        AttributeType::Other(_) => Ok(AttributeValue::Raw(value.clone())),
    }
}

fn to_float(value: &Value) -> Result<f64, NormalizeError> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| conversion_error(value, "float"))
}

fn to_int(value: &Value) -> Result<i64, NormalizeError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(flag) => Some(i64::from(*flag)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
    .ok_or_else(|| conversion_error(value, "int"))
}

fn to_bool(value: &Value) -> Result<bool, NormalizeError> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|f| f != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| conversion_error(value, "bool"))
}

fn conversion_error(value: &Value, target: &'static str) -> NormalizeError {
    NormalizeError::TypeConversion {
        value: value.to_string(),
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn floats_accept_numbers_bools_and_numeric_text() {
        assert_eq!(coerce(&json!(21.5), &AttributeType::Float), Ok(AttributeValue::Float(21.5)));
        assert_eq!(coerce(&json!(3), &AttributeType::Float), Ok(AttributeValue::Float(3.0)));
        assert_eq!(coerce(&json!(true), &AttributeType::Float), Ok(AttributeValue::Float(1.0)));
        assert_eq!(coerce(&json!(" 2.5 "), &AttributeType::Float), Ok(AttributeValue::Float(2.5)));
        assert!(coerce(&json!("warm"), &AttributeType::Float).is_err());
    }

    #[test]
    fn ints_truncate_floats() {
        assert_eq!(coerce(&json!(7.9), &AttributeType::Int), Ok(AttributeValue::Int(7)));
        assert_eq!(coerce(&json!("12"), &AttributeType::Int), Ok(AttributeValue::Int(12)));
        assert_eq!(coerce(&json!(false), &AttributeType::Int), Ok(AttributeValue::Int(0)));
        assert!(coerce(&json!({"a": 1}), &AttributeType::Int).is_err());
    }

    #[test]
    fn bools_from_text_and_numbers() {
        assert_eq!(coerce(&json!("ON"), &AttributeType::Bool), Ok(AttributeValue::Bool(true)));
        assert_eq!(coerce(&json!(0), &AttributeType::Bool), Ok(AttributeValue::Bool(false)));
        assert!(coerce(&json!("maybe"), &AttributeType::Bool).is_err());
    }

    #[test]
    fn strings_render_structured_values() {
        assert_eq!(
            coerce(&json!({"a": 1}), &AttributeType::String),
            Ok(AttributeValue::String(r#"{"a":1}"#.to_string()))
        );
        assert_eq!(
            coerce(&json!("ok"), &AttributeType::String),
            Ok(AttributeValue::String("ok".to_string()))
        );
    }

    #[test]
    fn null_never_converts_to_concrete_types() {
        for target in [
            AttributeType::Float,
            AttributeType::Int,
            AttributeType::Bool,
            AttributeType::String,
        ] {
            assert!(coerce(&Value::Null, &target).is_err());
        }
        assert_eq!(
            coerce(&Value::Null, &AttributeType::Other("matrix4d".into())),
            Ok(AttributeValue::Raw(Value::Null))
        );
    }
}
