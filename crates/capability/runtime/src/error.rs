use domain::{BindingKey, Protocol};
use scenelink_normalize::NormalizeError;
use scenelink_protocol::ProtocolError;

/// 协议管理器错误。
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid binding config: {}", .0.join("; "))]
    ConfigValidation(Vec<String>),
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(Protocol),
    #[error("binding not found: {0}")]
    BindingNotFound(BindingKey),
    #[error("binding not connected: {0}")]
    NotConnected(BindingKey),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    TypeConversion(#[from] NormalizeError),
}
