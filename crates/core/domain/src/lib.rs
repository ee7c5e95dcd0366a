//! 绑定领域模型
//!
//! 所有能力模块共享的词汇：协议、操作、认证方式、绑定配置、
//! 绑定标识、连接状态，以及属性类型与属性值。

pub mod binding;
pub mod refresh;
pub mod template;
pub mod validation;
pub mod value;

pub use binding::{
    AuthMethod, BindingConfig, BindingConfigError, BindingKey, ConnectionState, Operation,
    Protocol,
};
pub use refresh::{parse_refresh_interval, refresh_interval};
pub use template::substitute_placeholders;
pub use validation::{required_field_errors, validate_binding_fields};
pub use value::{AttributeType, AttributeValue};

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
