use domain::substitute_placeholders;
use serde_json::Value;

/// 递归替换配置中字符串里的 `${VAR}` 环境变量；未设置的变量保持原样。
pub fn substitute_env_vars(value: Value) -> Value {
    match value {
        Value::String(text) => {
            let (replaced, _) = substitute_placeholders(&text, |name| std::env::var(name).ok());
            Value::String(replaced)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(substitute_env_vars).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, substitute_env_vars(value)))
                .collect(),
        ),
        other => other,
    }
}
