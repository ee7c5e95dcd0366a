//! 上下文解析：沿实体层级向上收集 `binding:context` 与 `binding:authDefaults:<protocol>`。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use domain::Protocol;
use scenelink_scene::SceneGraph;
use serde_json::{Map, Value};
use tracing::warn;

pub const CONTEXT_KEY: &str = "binding:context";
pub const AUTH_DEFAULTS_PREFIX: &str = "binding:authDefaults:";

/// 变量上下文：变量名 → 值，键有序。
pub type Context = BTreeMap<String, Value>;

/// 按协议划分的认证默认值。
pub type AuthDefaults = BTreeMap<Protocol, Map<String, Value>>;

/// 上下文解析器。
///
/// 只读场景图，不产生副作用；祖先缺失时按空处理，元数据不是字典时告警后跳过该层。
#[derive(Clone)]
pub struct ContextResolver {
    scene: Arc<dyn SceneGraph>,
}

impl ContextResolver {
    pub fn new(scene: Arc<dyn SceneGraph>) -> Self {
        Self { scene }
    }

    /// 合并实体及其祖先的变量上下文，同名变量就近优先。
    pub fn resolve_context(&self, entity_path: &str) -> Context {
        let mut context = Context::new();
        for path in self.ancestry(entity_path) {
            if let Some(dictionary) = self.dictionary(&path, CONTEXT_KEY) {
                for (name, value) in dictionary {
                    context.entry(name).or_insert(value);
                }
            }
        }
        context
    }

    /// 收集各协议的认证默认值；每个协议取最近一层的整张字典，不跨层合并。
    pub fn resolve_auth_defaults(&self, entity_path: &str) -> AuthDefaults {
        let mut defaults = AuthDefaults::new();
        for path in self.ancestry(entity_path) {
            for protocol in Protocol::ALL {
                if defaults.contains_key(&protocol) {
                    continue;
                }
                let name = format!("{AUTH_DEFAULTS_PREFIX}{protocol}");
                if let Some(dictionary) = self.dictionary(&path, &name) {
                    defaults.insert(protocol, dictionary);
                }
            }
        }
        defaults
    }

    fn dictionary(&self, path: &str, key: &str) -> Option<Map<String, Value>> {
        match self.scene.metadata(path, key)? {
            Value::Object(dictionary) => Some(dictionary),
            other => {
                warn!(entity = %path, key = %key, value = %other, "binding metadata is not a dictionary, skipped");
                None
            }
        }
    }

    /// 实体自身在前，依次到根。
    fn ancestry(&self, entity_path: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(entity_path.to_string());
        while let Some(path) = current {
            if !seen.insert(path.clone()) {
                break;
            }
            current = self.scene.parent(&path);
            chain.push(path);
        }
        chain
    }
}

/// 上下文值转为替换文本。
pub(crate) fn context_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
