//! # Binding 模块
//!
//! 把场景元数据变成可注册的绑定配置：
//!
//! ```text
//! 属性元数据 binding:*  ──► 去命名空间 ──► ${var} 替换 ──► 合并认证默认值 ──► BindingConfig
//!                                   ▲                 ▲
//!              ContextResolver ─────┴─────────────────┘
//!              （沿祖先链收集 binding:context / binding:authDefaults:<protocol>）
//! ```
//!
//! - 上下文变量就近优先，逐键合并
//! - 认证默认值按协议取最近一层的整张字典，绑定自身字段优先
//! - 未解析的变量保持原样并告警

mod context;
mod parser;

pub use context::{AUTH_DEFAULTS_PREFIX, AuthDefaults, CONTEXT_KEY, Context, ContextResolver};
pub use parser::{BINDING_NAMESPACE, BindingParser, validate_binding_config};
