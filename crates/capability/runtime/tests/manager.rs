use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::{BindingConfig, BindingKey, ConnectionState, Operation, Protocol};
use scenelink_protocol::{
    ClientFactory, ProtocolClient, ProtocolError, StreamHandler, stream_key,
};
use scenelink_runtime::{ProtocolManager, RuntimeError, SubscriberError, UpdateSubscriber};
use scenelink_scene::{AttributeRecord, EntityRecord, InMemoryScene};
use serde_json::{Value, json};

/// 脚本化客户端：uri 中的关键字决定行为。
/// - `unreachable`：连接失败
/// - `timeout`：读取超时
/// - `text`：读取返回非数值文本
#[derive(Default)]
struct MockClient {
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    writes: Mutex<Vec<Value>>,
    streams: Mutex<HashMap<String, StreamHandler>>,
}

impl MockClient {
    async fn emit(&self, key: &BindingKey, value: Value) {
        let handler = self.streams.lock().unwrap().get(&key.to_string()).cloned();
        if let Some(handler) = handler {
            (handler.on_value)(value).await;
        }
    }

    /// 模拟连接丢失：通知全部流，流登记保留。
    fn interrupt(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let handlers: Vec<StreamHandler> = self.streams.lock().unwrap().values().cloned().collect();
        for handler in handlers {
            (handler.on_error)(&ProtocolError::Connection(reason.to_string()));
        }
    }

    fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }
}

fn uri_has(config: &BindingConfig, marker: &str) -> bool {
    config.uri.as_deref().is_some_and(|uri| uri.contains(marker))
}

#[async_trait]
impl ProtocolClient for MockClient {
    fn protocol(&self) -> Protocol {
        Protocol::Rest
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if uri_has(config, "unreachable") {
            return Err(ProtocolError::Connection("refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.streams.lock().unwrap().clear();
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        if uri_has(config, "timeout") {
            return Err(ProtocolError::Timeout("no response".into()));
        }
        if uri_has(config, "text") {
            return Ok(json!("not a number"));
        }
        Ok(json!(21.5))
    }

    async fn write(&self, _config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        self.writes.lock().unwrap().push(value.clone());
        Ok(true)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        self.streams
            .lock()
            .unwrap()
            .insert(stream_key(config), handler);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.streams.lock().unwrap().remove(&stream_key(config));
        Ok(())
    }
}

#[derive(Default)]
struct MockFactory {
    created: Mutex<Vec<Arc<MockClient>>>,
}

impl MockFactory {
    fn created(&self) -> Vec<Arc<MockClient>> {
        self.created.lock().unwrap().clone()
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolClient>> {
        if protocol == Protocol::Grpc {
            return None;
        }
        let client = Arc::new(MockClient::default());
        self.created.lock().unwrap().push(client.clone());
        Some(client)
    }
}

struct Fixture {
    manager: ProtocolManager,
    factory: Arc<MockFactory>,
    scene: Arc<InMemoryScene>,
}

fn fixture() -> Fixture {
    let scene = Arc::new(InMemoryScene::new());
    scene
        .insert_entity(
            EntityRecord::new("/World/Pump")
                .with_attribute(AttributeRecord::new("temperature", "double"))
                .with_attribute(AttributeRecord::new("pressure", "float"))
                .with_attribute(AttributeRecord::new("setpoint", "int")),
        )
        .unwrap();
    scene
        .insert_entity(
            EntityRecord::new("/World/Tank").with_attribute(AttributeRecord::new("level", "double")),
        )
        .unwrap();
    let factory = Arc::new(MockFactory::default());
    let manager = ProtocolManager::new(factory.clone(), scene.clone());
    Fixture {
        manager,
        factory,
        scene,
    }
}

fn rest_read(uri: &str, type_name: &str) -> BindingConfig {
    let mut config = BindingConfig::new(Protocol::Rest, "", "");
    config.uri = Some(uri.to_string());
    config.method = Some("GET".into());
    config.attribute_type = Some(type_name.to_string());
    config
}

fn mqtt_stream(uri: &str) -> BindingConfig {
    let mut config = BindingConfig::new(Protocol::Mqtt, "", "");
    config.operation = Operation::Stream;
    config.uri = Some(uri.to_string());
    config.topic = Some("plant/#".into());
    config.attribute_type = Some("double".into());
    config
}

#[tokio::test]
async fn read_binding_connects_and_writes_back() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/temp", "double"))
        .await
        .unwrap();

    let key = BindingKey::new("/World/Pump", "temperature");
    let snapshot = fx.manager.binding(&key).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.last_value, Some(json!(21.5)));
    assert!(snapshot.last_error.is_none());
    assert_eq!(fx.scene.attribute_value("/World/Pump", "temperature"), Some(json!(21.5)));
}

#[tokio::test]
async fn missing_uri_never_reaches_registry() {
    let fx = fixture();
    let mut config = BindingConfig::new(Protocol::Rest, "", "");
    config.method = Some("GET".into());

    let result = fx
        .manager
        .register_binding("/World/Pump", "temperature", config)
        .await;

    match result {
        Err(RuntimeError::ConfigValidation(errors)) => {
            assert_eq!(errors, vec!["REST binding requires 'uri' field".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(fx.manager.bindings().is_empty());
    assert!(fx.factory.created().is_empty());
}

#[tokio::test]
async fn identical_pool_keys_share_one_client() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/api", "double"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Pump", "pressure", rest_read("http://plant/api", "float"))
        .await
        .unwrap();
    let mut other_profile = rest_read("http://plant/api", "double");
    other_profile.auth_profile = Some("operator".into());
    fx.manager
        .register_binding("/World/Tank", "level", other_profile)
        .await
        .unwrap();

    let temperature = fx.manager.client_for(&BindingKey::new("/World/Pump", "temperature")).unwrap();
    let pressure = fx.manager.client_for(&BindingKey::new("/World/Pump", "pressure")).unwrap();
    let level = fx.manager.client_for(&BindingKey::new("/World/Tank", "level")).unwrap();

    assert!(Arc::ptr_eq(&temperature, &pressure));
    assert!(!Arc::ptr_eq(&temperature, &level));
    assert_eq!(fx.manager.pool_size(), 2);
    assert_eq!(fx.factory.created().len(), 2);
}

#[tokio::test]
async fn sibling_disconnect_keeps_shared_client_alive() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/api", "double"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Pump", "pressure", rest_read("http://plant/api", "float"))
        .await
        .unwrap();
    let shared = fx.factory.created()[0].clone();
    assert_eq!(shared.connects.load(Ordering::SeqCst), 1);

    let temperature = BindingKey::new("/World/Pump", "temperature");
    let pressure = BindingKey::new("/World/Pump", "pressure");
    fx.manager.disconnect_binding(&temperature).await.unwrap();

    assert!(shared.is_connected());
    assert_eq!(shared.disconnects.load(Ordering::SeqCst), 0);
    assert_eq!(fx.manager.binding(&temperature).unwrap().state, ConnectionState::Disconnected);
    assert_eq!(fx.manager.binding(&pressure).unwrap().state, ConnectionState::Connected);
    assert_eq!(fx.manager.refresh_binding(&pressure).await.unwrap(), json!(21.5));

    fx.manager.disconnect_binding(&pressure).await.unwrap();
    assert!(!shared.is_connected());
    assert_eq!(shared.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(fx.manager.pool_size(), 0);

    // 重复断开为空操作
    fx.manager.disconnect_binding(&pressure).await.unwrap();
    assert_eq!(shared.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stream_bindings_wait_for_explicit_start() {
    let fx = fixture();
    let key = BindingKey::new("/World/Tank", "level");
    fx.manager
        .register_binding("/World/Tank", "level", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();

    assert_eq!(fx.manager.streaming_bindings(), vec![key.clone()]);
    assert_eq!(fx.manager.binding(&key).unwrap().state, ConnectionState::Disconnected);
    assert!(fx.factory.created().is_empty());

    let report = fx.manager.start_streaming_connections().await;
    assert!(report.is_success());
    assert_eq!(report.succeeded, vec![key.clone()]);
    assert_eq!(fx.manager.binding(&key).unwrap().state, ConnectionState::Connected);

    let client = fx.factory.created()[0].clone();
    client.emit(&key, json!("0.42")).await;
    assert_eq!(fx.scene.attribute_value("/World/Tank", "level"), Some(json!(0.42)));
    assert_eq!(fx.manager.binding(&key).unwrap().last_value, Some(json!("0.42")));

    let report = fx.manager.stop_streaming_connections().await;
    assert_eq!(report.succeeded, vec![key.clone()]);
    assert_eq!(fx.manager.binding(&key).unwrap().state, ConnectionState::Disconnected);
    assert_eq!(client.stream_count(), 0);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn interrupted_stream_marks_binding_error_until_values_resume() {
    let fx = fixture();
    let temperature = BindingKey::new("/World/Pump", "temperature");
    let level = BindingKey::new("/World/Tank", "level");
    fx.manager
        .register_binding("/World/Pump", "temperature", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Tank", "level", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    assert!(fx.manager.start_streaming_connections().await.is_success());
    assert_eq!(fx.manager.pool_size(), 1);

    let client = fx.factory.created()[0].clone();
    client.interrupt("broker gone");
    for key in [&temperature, &level] {
        let snapshot = fx.manager.binding(key).unwrap();
        assert_eq!(snapshot.state, ConnectionState::Error);
        assert!(snapshot.last_error.unwrap().contains("broker gone"));
        assert!(snapshot.streaming);
    }

    // 一个绑定重新连接共享客户端，另一个绑定在流重新收到值后恢复
    fx.manager.connect_binding(&temperature).await.unwrap();
    assert_eq!(client.connects.load(Ordering::SeqCst), 2);
    assert_eq!(fx.manager.binding(&temperature).unwrap().state, ConnectionState::Connected);
    assert_eq!(fx.manager.binding(&level).unwrap().state, ConnectionState::Error);

    client.emit(&level, json!(0.5)).await;
    let snapshot = fx.manager.binding(&level).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert!(snapshot.last_error.is_none());
    assert_eq!(fx.scene.attribute_value("/World/Tank", "level"), Some(json!(0.5)));
}

#[tokio::test]
async fn interruption_after_disconnect_is_ignored() {
    let fx = fixture();
    let level = BindingKey::new("/World/Tank", "level");
    fx.manager
        .register_binding("/World/Tank", "level", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    fx.manager.start_streaming_connections().await;
    let client = fx.factory.created()[0].clone();
    let handler = client.streams.lock().unwrap().get(&level.to_string()).cloned().unwrap();

    fx.manager.disconnect_binding(&level).await.unwrap();
    (handler.on_error)(&ProtocolError::ChannelClosed);

    let snapshot = fx.manager.binding(&level).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn batch_start_isolates_failures() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Tank", "level", mqtt_stream("mqtt://unreachable"))
        .await
        .unwrap();

    let report = fx.manager.start_streaming_connections().await;

    assert_eq!(report.succeeded, vec![BindingKey::new("/World/Pump", "temperature")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, BindingKey::new("/World/Tank", "level"));

    let failed = fx.manager.binding(&BindingKey::new("/World/Tank", "level")).unwrap();
    assert_eq!(failed.state, ConnectionState::Error);
    assert!(failed.last_error.unwrap().contains("refused"));
}

#[tokio::test]
async fn unsupported_client_marks_binding_error() {
    let fx = fixture();
    let mut config = BindingConfig::new(Protocol::Grpc, "", "");
    config.uri = Some("grpc://robot:50051".into());
    config.query = Some("{}".into());

    fx.manager
        .register_binding("/World/Pump", "setpoint", config)
        .await
        .unwrap();

    let snapshot = fx.manager.binding(&BindingKey::new("/World/Pump", "setpoint")).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("unsupported protocol: grpc"));
}

#[tokio::test]
async fn conversion_failure_leaves_attribute_untouched() {
    let fx = fixture();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    fx.manager.add_subscriber(Arc::new(
        move |_entity: &str, _attribute: &str, _value: &Value| -> Result<(), SubscriberError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    ));

    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/text", "double"))
        .await
        .unwrap();

    let snapshot = fx.manager.binding(&BindingKey::new("/World/Pump", "temperature")).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.last_value, Some(json!("not a number")));
    assert!(snapshot.last_error.unwrap().contains("cannot convert"));
    assert_eq!(fx.scene.attribute_value("/World/Pump", "temperature"), None);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_read_keeps_binding_connected() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/timeout", "double"))
        .await
        .unwrap();

    let key = BindingKey::new("/World/Pump", "temperature");
    let snapshot = fx.manager.binding(&key).unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert!(snapshot.last_error.unwrap().contains("timeout"));

    let result = fx.manager.refresh_binding(&key).await;
    assert!(matches!(result, Err(RuntimeError::Protocol(ProtocolError::Timeout(_)))));
}

struct FailingSubscriber;

impl UpdateSubscriber for FailingSubscriber {
    fn on_update(&self, _: &str, _: &str, _: &Value) -> Result<(), SubscriberError> {
        Err("display closed".into())
    }
}

struct PanickingSubscriber;

impl UpdateSubscriber for PanickingSubscriber {
    fn on_update(&self, _: &str, _: &str, _: &Value) -> Result<(), SubscriberError> {
        panic!("subscriber bug");
    }
}

#[tokio::test]
async fn subscriber_failures_do_not_stop_fan_out() {
    let fx = fixture();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    fx.manager.add_subscriber(Arc::new(FailingSubscriber));
    fx.manager.add_subscriber(Arc::new(PanickingSubscriber));
    let id = fx.manager.add_subscriber(Arc::new(
        move |entity: &str, attribute: &str, value: &Value| -> Result<(), SubscriberError> {
            sink.lock()
                .unwrap()
                .push((format!("{entity}.{attribute}"), value.clone()));
            Ok(())
        },
    ));

    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/temp", "double"))
        .await
        .unwrap();
    assert_eq!(
        *received.lock().unwrap(),
        vec![("/World/Pump.temperature".to_string(), json!(21.5))]
    );

    assert!(fx.manager.remove_subscriber(id));
    assert!(!fx.manager.remove_subscriber(id));
}

#[tokio::test]
async fn write_connects_on_demand() {
    let fx = fixture();
    let mut config = rest_read("http://plant/setpoint", "int");
    config.operation = Operation::Write;
    config.method = Some("POST".into());
    fx.manager
        .register_binding("/World/Pump", "setpoint", config)
        .await
        .unwrap();

    let key = BindingKey::new("/World/Pump", "setpoint");
    assert_eq!(fx.manager.binding(&key).unwrap().state, ConnectionState::Disconnected);

    assert!(fx.manager.write_binding(&key, &json!(1500)).await.unwrap());
    assert_eq!(fx.manager.binding(&key).unwrap().state, ConnectionState::Connected);
    let client = fx.factory.created()[0].clone();
    assert_eq!(*client.writes.lock().unwrap(), vec![json!(1500)]);
}

#[tokio::test]
async fn reregistering_replaces_previous_binding() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/a", "double"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/b", "double"))
        .await
        .unwrap();

    let created = fx.factory.created();
    assert_eq!(created.len(), 2);
    assert!(!created[0].is_connected());
    assert!(created[1].is_connected());
    assert_eq!(fx.manager.bindings().len(), 1);
    assert_eq!(fx.manager.pool_size(), 1);
}

#[tokio::test]
async fn unregister_entity_removes_its_bindings() {
    let fx = fixture();
    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/a", "double"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Pump", "pressure", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Tank", "level", rest_read("http://plant/b", "double"))
        .await
        .unwrap();

    assert_eq!(fx.manager.unregister_entity("/World/Pump").await, 2);

    let remaining: Vec<BindingKey> = fx.manager.bindings().into_iter().map(|b| b.key).collect();
    assert_eq!(remaining, vec![BindingKey::new("/World/Tank", "level")]);
    assert!(fx.manager.streaming_bindings().is_empty());
    assert!(!fx.factory.created()[0].is_connected());
}

#[tokio::test]
async fn unknown_binding_is_reported() {
    let fx = fixture();
    let key = BindingKey::new("/World/Nowhere", "x");
    assert!(matches!(
        fx.manager.refresh_binding(&key).await,
        Err(RuntimeError::BindingNotFound(_))
    ));
    assert!(matches!(
        fx.manager.disconnect_binding(&key).await,
        Err(RuntimeError::BindingNotFound(_))
    ));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let fx = fixture();
    fx.manager.shutdown().await;

    fx.manager
        .register_binding("/World/Pump", "temperature", rest_read("http://plant/a", "double"))
        .await
        .unwrap();
    fx.manager
        .register_binding("/World/Tank", "level", mqtt_stream("mqtt://broker"))
        .await
        .unwrap();
    fx.manager.start_streaming_connections().await;

    fx.manager.shutdown().await;
    fx.manager.shutdown().await;

    assert!(fx.manager.bindings().is_empty());
    assert!(fx.manager.streaming_bindings().is_empty());
    assert_eq!(fx.manager.pool_size(), 0);
    assert!(fx.factory.created().iter().all(|client| !client.is_connected()));
}
