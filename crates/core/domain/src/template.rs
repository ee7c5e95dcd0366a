use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

/// 替换文本中的 `${name}` 占位符。
///
/// `resolve` 返回 `None` 的变量保持原样，并收集到第二个返回值中供调用方告警。
pub fn substitute_placeholders(
    text: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();
    let Some(pattern) = PLACEHOLDER.as_ref() else {
        return (text.to_string(), unresolved);
    };
    let replaced = pattern.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        match resolve(name) {
            Some(value) => value,
            None => {
                unresolved.push(name.to_string());
                caps[0].to_string()
            }
        }
    });
    (replaced.into_owned(), unresolved)
}
