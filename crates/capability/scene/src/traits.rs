//! 场景协作者接口
//!
//! 运行时只通过这两个接口接触宿主场景：读取层级与元数据，写回属性值。

use crate::error::SceneError;
use crate::models::AttributeRecord;
use domain::AttributeValue;
use serde_json::Value;

/// 场景图只读视图。
pub trait SceneGraph: Send + Sync {
    /// 全部实体路径。
    fn entities(&self) -> Vec<String>;

    /// 父实体路径；根实体返回 `None`。
    fn parent(&self, path: &str) -> Option<String>;

    /// 实体级元数据原值；实体或键不存在时返回 `None`。
    fn metadata(&self, path: &str, name: &str) -> Option<Value>;

    /// 实体的全部属性。
    fn attributes(&self, path: &str) -> Vec<AttributeRecord>;
}

/// 属性值写回接口。
#[async_trait::async_trait]
pub trait AttributeStore: Send + Sync {
    async fn set_value(
        &self,
        entity_path: &str,
        attribute_name: &str,
        value: &AttributeValue,
    ) -> Result<(), SceneError>;
}
