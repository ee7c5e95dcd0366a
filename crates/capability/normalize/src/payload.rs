use std::path::Path;

use serde_json::Value;
use tracing::warn;

/// 文本负载：能按 JSON 解析则返回结构化值，否则返回原文字符串。
pub fn decode_text_payload(payload: &[u8]) -> Value {
    let text = String::from_utf8_lossy(payload);
    serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
}

/// 文件内容解析。
///
/// `.json` 文件按 JSON 解析，失败时告警并返回去空白后的原文；
/// 其他文件先尝试整数、再尝试浮点，都不成立时返回原文。
pub fn decode_file_content(path: &Path, content: &str) -> Value {
    let trimmed = content.trim();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        return match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "invalid json file content");
                Value::String(trimmed.to_string())
            }
        };
    }

    if !trimmed.contains('.') {
        if let Ok(number) = trimmed.parse::<i64>() {
            return Value::from(number);
        }
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}
