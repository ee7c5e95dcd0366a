use std::sync::Arc;

use async_trait::async_trait;
use domain::{BindingConfig, Protocol};
use scenelink_protocol::{
    ClientSettings, EchoInvoker, GrpcChannel, GrpcClient, GrpcInvoker, ProtocolClient,
    ProtocolError,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn grpc_binding(uri: String) -> BindingConfig {
    let mut config = BindingConfig::new(Protocol::Grpc, "/World/Robot", "speed");
    config.uri = Some(uri);
    config.query = Some(r#"{"axis": 1}"#.into());
    config
}

#[tokio::test]
async fn echo_invoker_wraps_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = grpc_binding(format!("grpc://{addr}"));

    let client = GrpcClient::new(ClientSettings::default(), Arc::new(EchoInvoker));
    client.connect(&config).await.unwrap();
    assert!(client.is_connected());

    let value = client.read(&config).await.unwrap();
    assert_eq!(value, json!({"status": "success", "data": {"axis": 1}}));
    assert!(client.write(&config, &json!(5)).await.unwrap());
}

#[tokio::test]
async fn unreachable_channel_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GrpcClient::new(ClientSettings::default(), Arc::new(EchoInvoker));
    let result = client.connect(&grpc_binding(format!("grpc://{addr}"))).await;
    assert!(matches!(result, Err(ProtocolError::Connection(_))));
    assert!(!client.is_connected());
}

struct FixedInvoker;

#[async_trait]
impl GrpcInvoker for FixedInvoker {
    async fn unary(
        &self,
        channel: &GrpcChannel,
        _config: &BindingConfig,
        request: Value,
    ) -> Result<Value, ProtocolError> {
        Ok(json!({"address": channel.address, "request": request}))
    }

    async fn send(
        &self,
        _channel: &GrpcChannel,
        _config: &BindingConfig,
        _value: &Value,
    ) -> Result<bool, ProtocolError> {
        Ok(false)
    }
}

#[tokio::test]
async fn custom_invoker_receives_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = grpc_binding(format!("grpc://{addr}"));

    let client = GrpcClient::new(ClientSettings::default(), Arc::new(FixedInvoker));
    client.connect(&config).await.unwrap();

    let value = client.read(&config).await.unwrap();
    assert_eq!(value["address"], json!(addr.to_string()));
    assert_eq!(value["request"], json!({"axis": 1}));
    assert!(!client.write(&config, &json!(0)).await.unwrap());
}
