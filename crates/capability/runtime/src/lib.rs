//! # 协议管理器能力模块
//!
//! 绑定运行时的编排核心：
//! - **注册表**：按 `BindingKey`（实体路径 + 属性名）保存配置、连接状态、最近值与最近错误
//! - **连接池**：`protocol://uri#authProfile` 相同的绑定共享同一客户端，引用归零才断开
//! - **调度**：`read` 绑定注册即连接并读取一次；`stream` 绑定等待批量启动
//! - **值传播**：原始值 → 属性类型转换 → [`AttributeStore`](scenelink_scene::AttributeStore) 写回 → 订阅者通知
//!
//! ## 数据流
//!
//! ```text
//! ProtocolClient::read / 流回调
//!       │ serde_json::Value
//!       ▼
//! ProtocolManager::propagate
//!       ├── coerce(attribute type) ──► AttributeStore::set_value
//!       └── UpdateSubscriber::on_update（原始值，逐个隔离）
//! ```
//!
//! 单个绑定的失败只写入该绑定的 `last_error` 并记录日志，不会影响其他绑定。

mod error;
mod manager;
mod pool;
mod subscriber;

pub use error::RuntimeError;
pub use manager::{BatchFailure, BatchReport, BindingSnapshot, ProtocolManager};
pub use subscriber::{SubscriberError, SubscriberId, UpdateSubscriber};
