//! 绑定元数据解析

use std::sync::Arc;

use domain::{BindingConfig, BindingConfigError, Protocol, substitute_placeholders};
use scenelink_scene::{AttributeRecord, SceneGraph};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::{ContextResolver, context_text};

/// 属性元数据中的绑定命名空间。
pub const BINDING_NAMESPACE: &str = "binding:";

/// 绑定解析器：提取命名空间字段、替换变量、合并认证默认值。
#[derive(Clone)]
pub struct BindingParser {
    scene: Arc<dyn SceneGraph>,
    resolver: ContextResolver,
}

impl BindingParser {
    pub fn new(scene: Arc<dyn SceneGraph>) -> Self {
        let resolver = ContextResolver::new(scene.clone());
        Self { scene, resolver }
    }

    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    /// 解析出未类型化的绑定字段表；没有 `protocol` 的属性不是绑定，返回 `None`。
    pub fn parse_fields(
        &self,
        entity_path: &str,
        attribute: &AttributeRecord,
    ) -> Option<Map<String, Value>> {
        let mut fields: Map<String, Value> = attribute
            .metadata
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(BINDING_NAMESPACE)
                    .map(|field| (field.to_string(), value.clone()))
            })
            .collect();
        if !fields.contains_key("protocol") {
            return None;
        }

        let context = self.resolver.resolve_context(entity_path);
        for (field, value) in fields.iter_mut() {
            let Value::String(text) = value else {
                continue;
            };
            let (substituted, unresolved) =
                substitute_placeholders(text, |name| context.get(name).map(context_text));
            for variable in unresolved {
                warn!(
                    entity = %entity_path,
                    attribute = %attribute.name,
                    field = %field,
                    variable = %variable,
                    "binding variable not found in context"
                );
            }
            *text = substituted;
        }

        let protocol = fields
            .get("protocol")
            .and_then(Value::as_str)
            .and_then(|text| text.parse::<Protocol>().ok());
        if let Some(protocol) = protocol {
            let mut defaults = self.resolver.resolve_auth_defaults(entity_path);
            if let Some(defaults) = defaults.remove(&protocol) {
                for (key, value) in defaults {
                    fields.entry(key).or_insert(value);
                }
            }
        }

        Some(fields)
    }

    /// 解析为类型化配置。
    ///
    /// `Ok(None)`：不是绑定；`Err`：协议未知或枚举字段非法。
    pub fn parse_attribute(
        &self,
        entity_path: &str,
        attribute: &AttributeRecord,
    ) -> Result<Option<BindingConfig>, BindingConfigError> {
        let Some(fields) = self.parse_fields(entity_path, attribute) else {
            return Ok(None);
        };
        let type_name = (!attribute.type_name.is_empty()).then(|| attribute.type_name.clone());
        BindingConfig::from_fields(&fields, entity_path, &attribute.name, type_name).map(Some)
    }

    /// 扫描整个场景，返回全部可识别的绑定配置。
    ///
    /// 校验问题只告警，是否拒绝由注册方决定；无法类型化的绑定被跳过。
    pub fn scan_scene(&self) -> Vec<BindingConfig> {
        let mut configs = Vec::new();
        for entity_path in self.scene.entities() {
            for attribute in self.scene.attributes(&entity_path) {
                let Some(fields) = self.parse_fields(&entity_path, &attribute) else {
                    continue;
                };
                for problem in validate_binding_config(&fields) {
                    warn!(
                        entity = %entity_path,
                        attribute = %attribute.name,
                        problem = %problem,
                        "binding validation issue"
                    );
                }
                let type_name =
                    (!attribute.type_name.is_empty()).then(|| attribute.type_name.clone());
                match BindingConfig::from_fields(&fields, &entity_path, &attribute.name, type_name)
                {
                    Ok(config) => {
                        debug!(binding = %config.key(), protocol = %config.protocol, "binding found");
                        configs.push(config);
                    }
                    Err(error) => warn!(
                        entity = %entity_path,
                        attribute = %attribute.name,
                        error = %error,
                        "binding skipped"
                    ),
                }
            }
        }
        configs
    }
}

/// 校验绑定字段表，返回全部问题（空表示通过）。
pub fn validate_binding_config(fields: &Map<String, Value>) -> Vec<String> {
    domain::validate_binding_fields(fields)
}
