//! 协议错误类型定义

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("data parse error: {0}")]
    DataParse(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("not connected: {0}")]
    NotConnected(&'static str),

    #[error("{0} is not supported by this client")]
    NotSupported(&'static str),

    #[error("channel closed")]
    ChannelClosed,
}

impl ProtocolError {
    /// 必填字段缺失。
    pub(crate) fn missing(protocol: &str, field: &str) -> Self {
        ProtocolError::Config(format!("{protocol} binding requires '{field}' field"))
    }
}
