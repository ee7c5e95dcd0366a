//! 场景图内存实现

use crate::error::SceneError;
use crate::models::{AttributeRecord, EntityRecord, SceneDocument, parent_path};
use crate::traits::{AttributeStore, SceneGraph};
use domain::AttributeValue;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

/// 内存场景：实体按路径有序存放，属性写回直接更新记录中的值。
pub struct InMemoryScene {
    entities: RwLock<BTreeMap<String, EntityRecord>>,
}

impl InMemoryScene {
    /// 创建空场景
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_document(document: SceneDocument) -> Self {
        let entities = document
            .entities
            .into_iter()
            .map(|entity| (entity.path.clone(), entity))
            .collect();
        Self {
            entities: RwLock::new(entities),
        }
    }

    /// 从 JSON 场景文件加载。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let document: SceneDocument = serde_json::from_str(&text)?;
        Ok(Self::from_document(document))
    }

    /// 插入或替换实体。
    pub fn insert_entity(&self, entity: EntityRecord) -> Result<(), SceneError> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| SceneError::new("lock failed"))?;
        entities.insert(entity.path.clone(), entity);
        Ok(())
    }

    /// 读取属性当前值（用于测试与控制接口）。
    pub fn attribute_value(&self, entity_path: &str, attribute_name: &str) -> Option<Value> {
        let entities = self.entities.read().ok()?;
        entities
            .get(entity_path)?
            .attributes
            .iter()
            .find(|attribute| attribute.name == attribute_name)?
            .value
            .clone()
    }

    /// 实体数量（用于测试）
    pub fn len(&self) -> usize {
        self.entities.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for InMemoryScene {
    fn entities(&self) -> Vec<String> {
        self.entities
            .read()
            .map(|entities| entities.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn parent(&self, path: &str) -> Option<String> {
        parent_path(path)
    }

    fn metadata(&self, path: &str, name: &str) -> Option<Value> {
        let entities = self.entities.read().ok()?;
        entities.get(path)?.metadata.get(name).cloned()
    }

    fn attributes(&self, path: &str) -> Vec<AttributeRecord> {
        self.entities
            .read()
            .ok()
            .and_then(|entities| entities.get(path).map(|entity| entity.attributes.clone()))
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AttributeStore for InMemoryScene {
    async fn set_value(
        &self,
        entity_path: &str,
        attribute_name: &str,
        value: &AttributeValue,
    ) -> Result<(), SceneError> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| SceneError::new("lock failed"))?;
        let attribute = entities
            .get_mut(entity_path)
            .and_then(|entity| {
                entity
                    .attributes
                    .iter_mut()
                    .find(|attribute| attribute.name == attribute_name)
            })
            .ok_or_else(|| {
                SceneError::new(format!(
                    "attribute not found: {entity_path}.{attribute_name}"
                ))
            })?;
        attribute.value = Some(value.to_json());
        Ok(())
    }
}
