//! gRPC 客户端实现
//!
//! 通道按 URI scheme 选择：`grpc://` 明文（默认端口 80），`grpcs://` TLS（默认端口 443）。
//! 连接阶段只在有界时间内确认服务端可达。
//!
//! 具体服务的请求/响应编解码不做通用实现，而是通过 [`GrpcInvoker`] 扩展点注入；
//! 默认的 [`EchoInvoker`] 把请求原样包装返回并给出告警。

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{refresh_interval, BindingConfig, Protocol};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::client::{require, stream_key, ClientSettings, ProtocolClient, StreamHandler};
use crate::error::ProtocolError;
use crate::stream::{spawn_poller, StreamTasks};

/// 已就绪的 gRPC 通道描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcChannel {
    /// `host:port`
    pub address: String,
    pub tls: bool,
}

impl GrpcChannel {
    pub fn parse(uri: &str) -> Result<Self, ProtocolError> {
        let url = url::Url::parse(uri)
            .map_err(|e| ProtocolError::Config(format!("invalid grpc uri {uri}: {e}")))?;
        let tls = match url.scheme() {
            "grpc" => false,
            "grpcs" => true,
            other => {
                return Err(ProtocolError::Config(format!(
                    "unsupported grpc scheme: {other}"
                )))
            }
        };
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ProtocolError::Config(format!("grpc uri has no host: {uri}")))?;
        let port = url.port().unwrap_or(if tls { 443 } else { 80 });
        Ok(Self {
            address: format!("{host}:{port}"),
            tls,
        })
    }
}

/// 服务调用扩展点。
///
/// 实现方负责把 JSON 请求编码为具体服务的消息并解码响应。
#[async_trait]
pub trait GrpcInvoker: Send + Sync {
    async fn unary(
        &self,
        channel: &GrpcChannel,
        config: &BindingConfig,
        request: Value,
    ) -> Result<Value, ProtocolError>;

    async fn send(
        &self,
        channel: &GrpcChannel,
        config: &BindingConfig,
        value: &Value,
    ) -> Result<bool, ProtocolError>;
}

/// 默认调用器：不发起真实 RPC，返回 `{"status": "success", "data": <request>}`。
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoInvoker;

#[async_trait]
impl GrpcInvoker for EchoInvoker {
    async fn unary(
        &self,
        channel: &GrpcChannel,
        config: &BindingConfig,
        request: Value,
    ) -> Result<Value, ProtocolError> {
        warn!(
            binding = %config.key(),
            address = %channel.address,
            "generic grpc calls are not implemented, echoing request"
        );
        Ok(json!({ "status": "success", "data": request }))
    }

    async fn send(
        &self,
        channel: &GrpcChannel,
        config: &BindingConfig,
        _value: &Value,
    ) -> Result<bool, ProtocolError> {
        warn!(
            binding = %config.key(),
            address = %channel.address,
            "generic grpc calls are not implemented, write acknowledged without sending"
        );
        Ok(true)
    }
}

/// 把 `query` 字段解释为请求体：合法 JSON 原样使用，否则包装为 `{"data": query}`。
fn request_payload(config: &BindingConfig) -> Result<Value, ProtocolError> {
    let query = require(&config.query, "gRPC", "query")?;
    Ok(serde_json::from_str(query).unwrap_or_else(|_| json!({ "data": query })))
}

/// gRPC 协议客户端
pub struct GrpcClient {
    settings: ClientSettings,
    invoker: Arc<dyn GrpcInvoker>,
    channel: RwLock<Option<GrpcChannel>>,
    streams: StreamTasks,
}

impl GrpcClient {
    pub fn new(settings: ClientSettings, invoker: Arc<dyn GrpcInvoker>) -> Self {
        Self {
            settings,
            invoker,
            channel: RwLock::new(None),
            streams: StreamTasks::new(),
        }
    }

    fn channel(&self) -> Result<GrpcChannel, ProtocolError> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProtocolError::NotConnected("grpc"))
    }
}

#[async_trait]
impl ProtocolClient for GrpcClient {
    fn protocol(&self) -> Protocol {
        Protocol::Grpc
    }

    fn is_connected(&self) -> bool {
        self.channel
            .read()
            .map(|channel| channel.is_some())
            .unwrap_or(false)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let uri = require(&config.uri, "gRPC", "uri")?;
        let channel = GrpcChannel::parse(uri)?;
        match tokio::time::timeout(
            self.settings.connect_timeout,
            TcpStream::connect(&channel.address),
        )
        .await
        {
            Ok(Ok(_socket)) => {}
            Ok(Err(e)) => {
                return Err(ProtocolError::Connection(format!(
                    "grpc channel {} not reachable: {e}",
                    channel.address
                )))
            }
            Err(_) => {
                return Err(ProtocolError::Timeout(format!(
                    "grpc channel {} not ready within {:?}",
                    channel.address, self.settings.connect_timeout
                )))
            }
        }
        info!(address = %channel.address, tls = channel.tls, "grpc channel ready");
        *self.channel.write().unwrap_or_else(PoisonError::into_inner) = Some(channel);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        self.channel
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let channel = self.channel()?;
        let request = request_payload(config)?;
        self.invoker.unary(&channel, config, request).await
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let channel = self.channel()?;
        self.invoker.send(&channel, config, value).await
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let channel = self.channel()?;
        let request = request_payload(config)?;
        let every = refresh_interval(config, Protocol::Grpc.default_poll_seconds().unwrap_or(30.0));
        let key = stream_key(config);
        let invoker = self.invoker.clone();
        let config = config.clone();
        let handle = spawn_poller(
            key.clone(),
            every,
            move || {
                let invoker = invoker.clone();
                let channel = channel.clone();
                let config = config.clone();
                let request = request.clone();
                async move { invoker.unary(&channel, &config, request).await }
            },
            handler.on_value,
        );
        self.streams.insert(key, handle);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.streams.stop(&stream_key(config));
        Ok(())
    }
}
