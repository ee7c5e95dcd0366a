//! 值更新订阅者

use serde_json::Value;

pub type SubscriberId = u64;

pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// 值更新订阅者，收到的是类型转换前的原始值。
///
/// 返回错误或 panic 都只记录日志，不影响后续订阅者。
pub trait UpdateSubscriber: Send + Sync {
    fn on_update(
        &self,
        entity_path: &str,
        attribute_name: &str,
        value: &Value,
    ) -> Result<(), SubscriberError>;
}

impl<F> UpdateSubscriber for F
where
    F: Fn(&str, &str, &Value) -> Result<(), SubscriberError> + Send + Sync,
{
    fn on_update(
        &self,
        entity_path: &str,
        attribute_name: &str,
        value: &Value,
    ) -> Result<(), SubscriberError> {
        self(entity_path, attribute_name, value)
    }
}
