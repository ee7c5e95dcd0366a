use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 属性声明类型（按类型名子串归类）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    Float,
    Int,
    Bool,
    String,
    /// 未识别的类型名，值原样透传。
    Other(String),
}

impl AttributeType {
    /// 由场景图的类型名归类，例如 `double`、`float3`、`int64`、`bool`、`token`。
    pub fn from_type_name(type_name: &str) -> Self {
        let lowered = type_name.to_ascii_lowercase();
        if lowered.contains("double") || lowered.contains("float") || lowered.contains("half") {
            AttributeType::Float
        } else if lowered.contains("int") {
            AttributeType::Int
        } else if lowered.contains("bool") {
            AttributeType::Bool
        } else if lowered.contains("string") || lowered.contains("token") {
            AttributeType::String
        } else {
            AttributeType::Other(type_name.to_string())
        }
    }
}

/// 写回属性存储的类型化值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    /// 未识别类型时透传的原始值。
    Raw(Value),
}

impl AttributeValue {
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Int(value) => Value::from(*value),
            AttributeValue::Bool(value) => Value::Bool(*value),
            AttributeValue::String(value) => Value::String(value.clone()),
            AttributeValue::Raw(value) => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_classified_by_substring() {
        assert_eq!(AttributeType::from_type_name("double"), AttributeType::Float);
        assert_eq!(AttributeType::from_type_name("float3"), AttributeType::Float);
        assert_eq!(AttributeType::from_type_name("uint64"), AttributeType::Int);
        assert_eq!(AttributeType::from_type_name("bool"), AttributeType::Bool);
        assert_eq!(AttributeType::from_type_name("token"), AttributeType::String);
        assert_eq!(
            AttributeType::from_type_name("matrix4d"),
            AttributeType::Other("matrix4d".into())
        );
    }
}
