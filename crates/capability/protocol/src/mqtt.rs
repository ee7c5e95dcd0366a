//! MQTT 客户端实现
//!
//! 一个客户端对应一条 broker 连接，事件循环在后台任务中运行，
//! 收到的 PUBLISH 通过广播通道分发给一次性读取与各个流。
//!
//! broker 断线时通知全部流，事件循环自动重连并重新订阅；客户端被重新 `connect`
//! 时，仍登记的流在新会话上重新订阅并继续接收。
//!
//! ## URI
//!
//! - `mqtt://[user:pass@]host[:1883]`
//! - `mqtts://[user:pass@]host[:8883]`：`authMethod = mtls` 时从认证档案加载客户端证书链，
//!   信任根为系统根证书，档案给出 `ca_cert_path` 时追加该 CA

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::{AuthMethod, BindingConfig, Protocol};
use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use scenelink_auth::AuthManager;
use scenelink_normalize::decode_text_payload;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{
    require, shape_payload, stream_key, ClientSettings, ProtocolClient, StreamHandler,
};
use crate::error::ProtocolError;
use crate::stream::{AttachedStreams, StreamTasks};

const MESSAGE_BUFFER: usize = 256;
const REQUEST_CAPACITY: usize = 64;
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// broker 推送的一条消息
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// 解析后的 broker 地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MqttEndpoint {
    pub fn parse(uri: &str) -> Result<Self, ProtocolError> {
        let url = url::Url::parse(uri)
            .map_err(|e| ProtocolError::Config(format!("invalid mqtt uri {uri}: {e}")))?;
        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => {
                return Err(ProtocolError::Config(format!(
                    "unsupported mqtt scheme: {other}"
                )))
            }
        };
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ProtocolError::Config(format!("mqtt uri has no host: {uri}")))?
            .to_string();
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });
        let username = (!url.username().is_empty()).then(|| url.username().to_string());
        let password = url.password().map(str::to_string);
        Ok(Self {
            host,
            port,
            tls,
            username,
            password,
        })
    }
}

/// MQTT 主题过滤匹配，支持 `+` 与 `#` 通配。
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// 等待第一条匹配主题的消息，超时返回 [`ProtocolError::Timeout`]。
pub async fn wait_for_message(
    receiver: &mut broadcast::Receiver<MqttMessage>,
    filter: &str,
    wait: Duration,
) -> Result<Vec<u8>, ProtocolError> {
    let next = async {
        loop {
            match receiver.recv().await {
                Ok(message) if topic_matches(filter, &message.topic) => {
                    return Ok(message.payload)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %filter, skipped, "mqtt reader lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ProtocolError::ChannelClosed),
            }
        }
    };
    tokio::time::timeout(wait, next).await.map_err(|_| {
        ProtocolError::Timeout(format!(
            "no message on {filter} within {}s",
            wait.as_secs_f64()
        ))
    })?
}

/// 构造双向 TLS 配置：系统根证书 + 可选 CA，附带客户端证书链与私钥（PEM）。
pub fn client_tls_config(
    cert_pem: &[u8],
    key_pem: &[u8],
    ca_pem: Option<&[u8]>,
) -> Result<ClientConfig, ProtocolError> {
    let mut roots = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = roots.add_parsable_certificates(certs);
            debug!(added, ignored, "native root certificates loaded");
        }
        Err(e) => warn!(error = %e, "failed to load native root certificates"),
    }
    if let Some(mut ca) = ca_pem {
        for cert in rustls_pemfile::certs(&mut ca) {
            let cert = cert.map_err(|e| invalid("ca certificate", e))?;
            roots.add(cert).map_err(|e| invalid("ca certificate", e))?;
        }
    }

    let mut cert_reader = cert_pem;
    let chain = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid("client certificate", e))?;
    if chain.is_empty() {
        return Err(ProtocolError::Config(
            "client certificate file holds no certificate".into(),
        ));
    }
    let mut key_reader = key_pem;
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| invalid("client key", e))?
        .ok_or_else(|| ProtocolError::Config("client key file holds no private key".into()))?;

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| invalid("client certificate", e))
}

fn invalid(what: &str, err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::Config(format!("invalid {what}: {err}"))
}

fn qos_for(config: &BindingConfig) -> QoS {
    match config.extra.get("qos").and_then(Value::as_u64) {
        Some(2) => QoS::ExactlyOnce,
        Some(1) => QoS::AtLeastOnce,
        _ => QoS::AtMostOnce,
    }
}

/// 按主题过滤广播消息并回调；通道关闭即会话已被丢弃，通知后结束。
fn spawn_topic_stream(
    mut receiver: broadcast::Receiver<MqttMessage>,
    key: String,
    config: BindingConfig,
    handler: StreamHandler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let filter = config.topic.clone().unwrap_or_default();
        loop {
            match receiver.recv().await {
                Ok(message) if topic_matches(&filter, &message.topic) => {
                    let value = shape_payload(&config, decode_text_payload(&message.payload));
                    (handler.on_value)(value).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(stream = %key, skipped, "mqtt stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(stream = %key, "mqtt stream channel closed");
                    (handler.on_error)(&ProtocolError::ChannelClosed);
                    break;
                }
            }
        }
    })
}

#[derive(Clone)]
struct SessionHandles {
    client: AsyncClient,
    messages: broadcast::Sender<MqttMessage>,
}

struct MqttSession {
    handles: SessionHandles,
    event_loop: JoinHandle<()>,
}

type Subscriptions = Arc<Mutex<HashMap<String, (usize, QoS)>>>;

/// MQTT 协议客户端
pub struct MqttClient {
    auth: Arc<AuthManager>,
    settings: ClientSettings,
    session: Mutex<Option<MqttSession>>,
    connected: Arc<AtomicBool>,
    subscriptions: Subscriptions,
    streams: StreamTasks,
    attached: Arc<AttachedStreams>,
}

impl MqttClient {
    pub fn new(auth: Arc<AuthManager>, settings: ClientSettings) -> Self {
        Self {
            auth,
            settings,
            session: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            streams: StreamTasks::new(),
            attached: Arc::new(AttachedStreams::default()),
        }
    }

    fn handles(&self) -> Result<SessionHandles, ProtocolError> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.handles.clone())
            .ok_or(ProtocolError::NotConnected("mqtt"))
    }

    /// 主题当前的使用者数量（读取与流共享同一订阅）。
    pub fn topic_refs(&self, topic: &str) -> usize {
        self.subscriptions
            .lock()
            .map(|subscriptions| subscriptions.get(topic).map_or(0, |entry| entry.0))
            .unwrap_or(0)
    }

    /// 主题订阅引用计数：首个使用者才真正 SUBSCRIBE。
    async fn acquire_topic(
        &self,
        client: &AsyncClient,
        topic: &str,
        qos: QoS,
    ) -> Result<(), ProtocolError> {
        let first = {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let entry = subscriptions.entry(topic.to_string()).or_insert((0, qos));
            entry.0 += 1;
            entry.0 == 1
        };
        if first {
            if let Err(e) = client.subscribe(topic, qos).await {
                self.forget_topic(topic);
                return Err(ProtocolError::Connection(e.to_string()));
            }
            debug!(topic = %topic, "mqtt subscribed");
        }
        Ok(())
    }

    /// 最后一个使用者释放时才 UNSUBSCRIBE。
    async fn release_topic(&self, client: Option<&AsyncClient>, topic: &str) {
        if !self.forget_topic(topic) {
            return;
        }
        if let Some(client) = client {
            if let Err(e) = client.unsubscribe(topic).await {
                warn!(topic = %topic, error = %e, "mqtt unsubscribe failed");
            }
        }
    }

    /// 计数减一，返回是否已无使用者。
    fn forget_topic(&self, topic: &str) -> bool {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match subscriptions.get_mut(topic) {
            Some(entry) if entry.0 > 1 => {
                entry.0 -= 1;
                false
            }
            Some(_) => {
                subscriptions.remove(topic);
                true
            }
            None => false,
        }
    }

    async fn transport(&self, config: &BindingConfig) -> Transport {
        if config.auth_method == AuthMethod::Mtls {
            if let Some(profile) = config.auth_profile.as_deref() {
                match self.client_auth_transport(profile).await {
                    Ok(Some(transport)) => return transport,
                    Ok(None) => {}
                    Err(e) => {
                        error!(profile = %profile, error = %e, "failed to load mqtt client certificate")
                    }
                }
            }
        }
        Transport::tls_with_default_config()
    }

    async fn client_auth_transport(&self, profile: &str) -> Result<Option<Transport>, ProtocolError> {
        let Some(material) = self.auth.get_mtls_config(profile) else {
            return Ok(None);
        };
        let cert = tokio::fs::read(&material.cert_path).await?;
        let key = tokio::fs::read(&material.key_path).await?;
        let ca = match &material.ca_path {
            Some(ca_path) => Some(tokio::fs::read(ca_path).await?),
            None => None,
        };
        let config = client_tls_config(&cert, &key, ca.as_deref())?;
        Ok(Some(Transport::tls_with_config(TlsConfiguration::Rustls(
            Arc::new(config),
        ))))
    }

    /// 新会话建立后：重新订阅仍在使用的主题，并把登记的流挂到新的广播通道上。
    async fn reattach(&self, handles: &SessionHandles) -> usize {
        let topics: Vec<(String, QoS)> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(topic, (_, qos))| (topic.clone(), *qos))
            .collect();
        for (topic, qos) in topics {
            if let Err(e) = handles.client.subscribe(topic.clone(), qos).await {
                warn!(topic = %topic, error = %e, "mqtt resubscribe failed");
            }
        }

        let entries = self.attached.entries();
        for (key, config, handler) in &entries {
            let handle = spawn_topic_stream(
                handles.messages.subscribe(),
                key.clone(),
                config.clone(),
                handler.clone(),
            );
            self.streams.insert(key.clone(), handle);
        }
        entries.len()
    }

    async fn close_session(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(session) = session {
            if let Err(e) = session.handles.client.disconnect().await {
                debug!(error = %e, "mqtt disconnect request failed");
            }
            session.event_loop.abort();
        }
    }
}

#[async_trait]
impl ProtocolClient for MqttClient {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let uri = require(&config.uri, "MQTT", "uri")?;
        let endpoint = MqttEndpoint::parse(uri)?;

        let client_id = format!("scenelink-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, endpoint.host.clone(), endpoint.port);
        options.set_keep_alive(self.settings.mqtt_keep_alive.max(MIN_KEEP_ALIVE));
        if let Some(username) = endpoint.username.clone() {
            options.set_credentials(username, endpoint.password.clone().unwrap_or_default());
        }
        if endpoint.tls {
            options.set_transport(self.transport(config).await);
        }

        // 旧会话上的流任务先取消，登记保留到新会话建立后重新挂接
        self.streams.stop_all();
        self.close_session().await;

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (messages, _) = broadcast::channel(MESSAGE_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        let forward = messages.clone();
        let connected = self.connected.clone();
        let attached = self.attached.clone();
        let subscriptions = self.subscriptions.clone();
        let resubscribe = client.clone();
        let broker = format!("{}:{}", endpoint.host, endpoint.port);
        let event_loop = tokio::spawn(async move {
            let mut ready = Some(ready_tx);
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected.store(true, Ordering::SeqCst);
                        match ready.take() {
                            Some(tx) => {
                                let _ = tx.send(Ok(()));
                            }
                            None => {
                                // 重连后 broker 不保留会话，重新订阅仍在使用的主题
                                let topics: Vec<(String, QoS)> = subscriptions
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .iter()
                                    .map(|(topic, (_, qos))| (topic.clone(), *qos))
                                    .collect();
                                for (topic, qos) in topics {
                                    if let Err(e) = resubscribe.try_subscribe(topic.clone(), qos) {
                                        warn!(broker = %broker, topic = %topic, error = %e, "mqtt resubscribe failed");
                                    }
                                }
                                info!(broker = %broker, "mqtt reconnected");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = forward.send(MqttMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let was_connected = connected.swap(false, Ordering::SeqCst);
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Err(e.to_string()));
                            return;
                        }
                        warn!(broker = %broker, error = %e, "mqtt event loop error");
                        if was_connected {
                            attached.fail_all(&ProtocolError::Connection(format!(
                                "mqtt connection to {broker} lost: {e}"
                            )));
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let outcome = tokio::time::timeout(self.settings.connect_timeout, ready_rx).await;
        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(message))) => Some(ProtocolError::Connection(message)),
            Ok(Err(_)) => Some(ProtocolError::Connection("mqtt event loop stopped".into())),
            Err(_) => Some(ProtocolError::Timeout(format!("mqtt connect to {uri}"))),
        };
        if let Some(err) = failure {
            event_loop.abort();
            self.connected.store(false, Ordering::SeqCst);
            self.attached.fail_all(&err);
            return Err(err);
        }

        let handles = SessionHandles { client, messages };
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(MqttSession {
            handles: handles.clone(),
            event_loop,
        });
        let reattached = self.reattach(&handles).await;
        info!(broker = %uri, reattached, "mqtt connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        self.attached.clear();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.close_session().await;
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let topic = require(&config.topic, "MQTT", "topic")?;
        let handles = self.handles()?;

        // 先挂接收端再订阅，保留消息不会丢
        let mut receiver = handles.messages.subscribe();
        self.acquire_topic(&handles.client, topic, qos_for(config))
            .await?;
        let outcome = wait_for_message(&mut receiver, topic, self.settings.read_timeout).await;
        self.release_topic(Some(&handles.client), topic).await;

        let payload = outcome?;
        Ok(shape_payload(config, decode_text_payload(&payload)))
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let topic = require(&config.topic, "MQTT", "topic")?;
        let handles = self.handles()?;
        let payload = match value {
            Value::String(text) => text.clone().into_bytes(),
            other => serde_json::to_vec(other)
                .map_err(|e| ProtocolError::DataParse(e.to_string()))?,
        };
        handles
            .client
            .publish(topic, qos_for(config), false, payload)
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        Ok(true)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let topic = require(&config.topic, "MQTT", "topic")?.to_string();
        let handles = self.handles()?;
        let receiver = handles.messages.subscribe();
        self.acquire_topic(&handles.client, &topic, qos_for(config))
            .await?;

        let key = stream_key(config);
        let handle = spawn_topic_stream(receiver, key.clone(), config.clone(), handler.clone());
        if self.streams.insert(key.clone(), handle) {
            // 同一绑定重复启动：旧流已取消，归还它占用的订阅
            self.release_topic(Some(&handles.client), &topic).await;
        }
        self.attached.attach(key, config.clone(), handler);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let key = stream_key(config);
        let attached = self.attached.detach(&key);
        let running = self.streams.stop(&key);
        if attached || running {
            if let Some(topic) = config.topic.as_deref() {
                let client = self.handles().ok().map(|handles| handles.client);
                self.release_topic(client.as_ref(), topic).await;
            }
        }
        Ok(())
    }
}
