//! # 协议客户端能力模块
//!
//! 为绑定提供统一的协议客户端契约，支持：
//! - **MQTT**：一次性读取（有界等待一条消息）、发布、订阅流
//! - **REST**：持久 HTTP 会话，认证头在连接时附加，轮询流
//! - **SQL**：`sqlx` Any 驱动，结果形态归一化，参数化写入，轮询流
//! - **gRPC**：通道就绪探测，服务调用通过 [`GrpcInvoker`] 扩展
//! - **WebSocket**：持久连接，订阅/发布信封，消息流
//! - **File**：本地文件读写，mtime 轮询流
//!
//! ## 架构设计
//!
//! ```text
//! BindingConfig (protocol + uri/topic/query/...)
//!       │
//!       ▼
//! ClientFactory ──► Arc<dyn ProtocolClient>   (由协议管理器按 protocol://uri#profile 池化)
//!       │
//!       ├── connect / disconnect
//!       ├── read  ──► serde_json::Value
//!       ├── write ──► bool
//!       └── start_stream / stop_stream ──► StreamHandler（按绑定键区分的后台任务，重连后重新挂接）
//! ```
//!
//! ## 能力矩阵
//!
//! | 协议 | read | write | stream |
//! |---|---|---|---|
//! | MQTT | 等待一条消息 | 发布 | 订阅转发 |
//! | REST | 请求 | POST/PUT/PATCH | 轮询（默认 30s） |
//! | SQL | 查询 | 参数化执行 | 轮询（默认 60s） |
//! | gRPC | 调用器 | 调用器 | 轮询（默认 30s） |
//! | WebSocket | 等待一条消息 | 发送 | 消息转发 |
//! | File | 读取 | 写入 | mtime 轮询（默认 5s） |
//!
//! 不支持的能力返回 [`ProtocolError::NotSupported`]，不会静默忽略。

mod client;
mod error;
mod factory;
mod file;
mod grpc;
mod mqtt;
mod rest;
mod sql;
mod stream;
mod websocket;

pub use client::{
    stream_key, ClientSettings, ProtocolClient, StreamErrorCallback, StreamHandler, ValueCallback,
};
pub use error::ProtocolError;
pub use factory::{ClientFactory, DefaultClientFactory};
pub use file::{file_path, FileClient};
pub use grpc::{EchoInvoker, GrpcChannel, GrpcClient, GrpcInvoker};
pub use mqtt::{topic_matches, wait_for_message, MqttClient, MqttEndpoint, MqttMessage};
pub use rest::RestClient;
pub use sql::SqlClient;
pub use stream::StreamTasks;
pub use websocket::WebSocketClient;
