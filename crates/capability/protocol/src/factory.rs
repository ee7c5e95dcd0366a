//! 客户端工厂

use std::sync::Arc;

use domain::Protocol;
use scenelink_auth::AuthManager;

use crate::client::{ClientSettings, ProtocolClient};
use crate::file::FileClient;
use crate::grpc::{EchoInvoker, GrpcClient, GrpcInvoker};
use crate::mqtt::MqttClient;
use crate::rest::RestClient;
use crate::sql::SqlClient;
use crate::websocket::WebSocketClient;

/// 按协议构造新的客户端实例。
///
/// 协议管理器只在连接池未命中时调用；测试中可替换为脚本化实现。
pub trait ClientFactory: Send + Sync {
    fn create(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolClient>>;
}

/// 默认工厂：六种协议的内置客户端
pub struct DefaultClientFactory {
    auth: Arc<AuthManager>,
    settings: ClientSettings,
    grpc_invoker: Arc<dyn GrpcInvoker>,
}

impl DefaultClientFactory {
    pub fn new(auth: Arc<AuthManager>, settings: ClientSettings) -> Self {
        Self {
            auth,
            settings,
            grpc_invoker: Arc::new(EchoInvoker),
        }
    }

    /// 替换 gRPC 调用器。
    pub fn with_grpc_invoker(mut self, invoker: Arc<dyn GrpcInvoker>) -> Self {
        self.grpc_invoker = invoker;
        self
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolClient>> {
        let auth = self.auth.clone();
        let settings = self.settings.clone();
        let client: Arc<dyn ProtocolClient> = match protocol {
            Protocol::Mqtt => Arc::new(MqttClient::new(auth, settings)),
            Protocol::Rest => Arc::new(RestClient::new(auth, settings)),
            Protocol::Sql => Arc::new(SqlClient::new(auth, settings)),
            Protocol::Grpc => Arc::new(GrpcClient::new(settings, self.grpc_invoker.clone())),
            Protocol::Websocket => Arc::new(WebSocketClient::new(auth, settings)),
            Protocol::File => Arc::new(FileClient::new()),
        };
        Some(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_a_client_for_every_protocol() {
        let factory =
            DefaultClientFactory::new(Arc::new(AuthManager::empty()), ClientSettings::default());
        for protocol in Protocol::ALL {
            let client = factory.create(protocol).unwrap();
            assert_eq!(client.protocol(), protocol);
            assert!(!client.is_connected());
        }
    }
}
