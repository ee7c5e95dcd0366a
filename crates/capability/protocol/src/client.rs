//! 协议客户端契约

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{BindingConfig, Protocol};
use futures::future::BoxFuture;
use scenelink_normalize::extract_json_path;
use serde_json::Value;
use tracing::warn;

use crate::error::ProtocolError;

/// 流式值回调。
///
/// 回调返回的 Future 完成后流循环才会取下一条消息，保证同一绑定的值按序处理。
pub type ValueCallback = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// 流意外中断回调：连接丢失、消息通道关闭等。`stop_stream`/`disconnect` 主动停止时不会调用。
pub type StreamErrorCallback = Arc<dyn Fn(&ProtocolError) + Send + Sync>;

/// 一条流的回调组合。
#[derive(Clone)]
pub struct StreamHandler {
    pub on_value: ValueCallback,
    pub on_error: StreamErrorCallback,
}

impl StreamHandler {
    /// 只处理值，中断时记录告警。
    pub fn new(on_value: ValueCallback) -> Self {
        Self {
            on_value,
            on_error: Arc::new(|err: &ProtocolError| warn!(error = %err, "stream interrupted")),
        }
    }

    pub fn with_error(mut self, on_error: StreamErrorCallback) -> Self {
        self.on_error = on_error;
        self
    }
}

/// 客户端公共超时设置
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// 一次性读取（MQTT/WebSocket 等待消息）的上限
    pub read_timeout: Duration,
    /// 建立连接/就绪探测的上限
    pub connect_timeout: Duration,
    /// REST 会话的单次请求总超时
    pub http_timeout: Duration,
    /// MQTT keep-alive
    pub mqtt_keep_alive: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            mqtt_keep_alive: Duration::from_secs(30),
        }
    }
}

/// 协议客户端。
///
/// 同一客户端实例可能被连接池中的多个绑定共享，因此所有方法都取 `&self`，
/// 连接状态只能通过这些方法改变。流按绑定键区分，`stop_stream` 只停止该绑定的流，
/// `disconnect` 停止全部流并释放连接。推送式客户端（MQTT、WebSocket）在重新 `connect`
/// 后把仍登记的流挂接到新连接上。
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn is_connected(&self) -> bool;

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError>;

    async fn disconnect(&self) -> Result<(), ProtocolError>;

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError>;

    async fn write(&self, _config: &BindingConfig, _value: &Value) -> Result<bool, ProtocolError> {
        Err(ProtocolError::NotSupported("write"))
    }

    async fn start_stream(
        &self,
        _config: &BindingConfig,
        _handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotSupported("stream"))
    }

    async fn stop_stream(&self, _config: &BindingConfig) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotSupported("stream"))
    }
}

/// 流任务键：绑定标识的文本形式。
pub fn stream_key(config: &BindingConfig) -> String {
    config.key().to_string()
}

/// 按绑定配置的 `jsonPath` 提取值。
pub(crate) fn shape_payload(config: &BindingConfig, data: Value) -> Value {
    match config.json_path.as_deref() {
        Some(path) => extract_json_path(&data, path),
        None => data,
    }
}

pub(crate) fn require<'a>(
    value: &'a Option<String>,
    protocol: &str,
    field: &str,
) -> Result<&'a str, ProtocolError> {
    value
        .as_deref()
        .ok_or_else(|| ProtocolError::missing(protocol, field))
}
