//! 值规范化：协议负载 → JSON 值 → 属性类型化值。
//!
//! - [`decode_text_payload`]：文本负载优先按 JSON 解析，失败保留原文
//! - [`decode_file_content`]：文件内容按扩展名解析，非 JSON 文件做数值推断
//! - [`extract_json_path`]：受限点路径 `$.a.b[0]`；开启 `jsonpath` 特性时改用完整 JSONPath
//! - [`coerce`]：按属性声明类型转换，失败返回 [`NormalizeError::TypeConversion`]

mod coerce;
mod json_path;
mod payload;

pub use coerce::coerce;
pub use json_path::extract_json_path;
pub use payload::{decode_file_content, decode_text_payload};

/// 规范化错误。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("cannot convert {value} to {target}")]
    TypeConversion { value: String, target: &'static str },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
