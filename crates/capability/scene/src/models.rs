//! 场景数据模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 属性记录：名称、声明类型、元数据与当前值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl AttributeRecord {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            metadata: Map::new(),
            value: None,
        }
    }

    /// 附加一条元数据（构造测试场景时使用）。
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// 实体记录。
///
/// `metadata` 存放实体级字典，例如 `binding:context`、`binding:authDefaults:mqtt`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub path: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
}

impl EntityRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: Map::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeRecord) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// 场景文档（宿主进程从 JSON 文件加载）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

/// 按路径段计算父实体路径；根路径无父级。
pub fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(index) => Some(trimmed[..index].to_string()),
        None => None,
    }
}
