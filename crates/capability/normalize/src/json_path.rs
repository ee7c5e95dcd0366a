use serde_json::Value;
use tracing::warn;

/// 按路径从结构化数据中取值。
///
/// 只对对象/数组生效，标量原样返回。路径不存在时返回 `Null`；
/// 受限语法之外的表达式告警后原样返回数据。
pub fn extract_json_path(data: &Value, path: &str) -> Value {
    if !matches!(data, Value::Object(_) | Value::Array(_)) {
        return data.clone();
    }

    #[cfg(feature = "jsonpath")]
    {
        if let Ok(matches) = jsonpath_lib::select(data, path) {
            return matches.first().map(|value| (*value).clone()).unwrap_or(Value::Null);
        }
    }

    match dotted_path(path) {
        Some(segments) => resolve(data, &segments).cloned().unwrap_or(Value::Null),
        None => {
            warn!(path = %path, "unsupported json path expression");
            data.clone()
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// 解析 `$`、`$.a.b`、`$.items[0].name`、`$.items.0`。
fn dotted_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let path = path.trim();
    if path == "$" {
        return Some(Vec::new());
    }
    let rest = path.strip_prefix("$.")?;
    let mut segments = Vec::new();
    for part in rest.split('.') {
        let (name, mut brackets) = match part.find('[') {
            Some(at) => (&part[..at], &part[at..]),
            None => (part, ""),
        };
        if name.is_empty() && brackets.is_empty() {
            return None;
        }
        if !name.is_empty() {
            segments.push(Segment::Key(name));
        }
        while !brackets.is_empty() {
            let close = brackets.find(']')?;
            let index = brackets.get(1..close)?.trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            brackets = &brackets[close + 1..];
            if !brackets.is_empty() && !brackets.starts_with('[') {
                return None;
            }
        }
    }
    Some(segments)
}

fn resolve<'v>(data: &'v Value, segments: &[Segment<'_>]) -> Option<&'v Value> {
    let mut current = data;
    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(*key)?,
            (Segment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}
