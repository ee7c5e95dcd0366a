//! WebSocket 客户端实现
//!
//! 一条持久连接：写半部由互斥锁保护，读半部在后台任务中读取并广播文本帧。
//! 设置了 `topic` 时，读取/流式前先发送订阅信封 `{"action":"subscribe","topic":...}`，
//! 写入时发送 `{"action":"publish","topic":...,"data":...}`。
//!
//! 对端关闭连接时通知全部流；之后任一绑定重新 `connect`，仍登记的流会在新连接上重发订阅信封并继续接收。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::{AuthMethod, BindingConfig, Protocol};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use scenelink_auth::AuthManager;
use scenelink_normalize::decode_text_payload;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::{
    require, shape_payload, stream_key, ClientSettings, ProtocolClient, StreamHandler,
};
use crate::error::ProtocolError;
use crate::stream::{AttachedStreams, StreamTasks};

const MESSAGE_BUFFER: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

#[derive(Clone)]
struct WsHandles {
    sink: Arc<tokio::sync::Mutex<WsSink>>,
    messages: broadcast::Sender<String>,
}

struct WsSession {
    handles: WsHandles,
    reader: JoinHandle<()>,
}

/// WebSocket 协议客户端
pub struct WebSocketClient {
    auth: Arc<AuthManager>,
    settings: ClientSettings,
    session: Mutex<Option<WsSession>>,
    connected: Arc<AtomicBool>,
    streams: StreamTasks,
    attached: Arc<AttachedStreams>,
}

impl WebSocketClient {
    pub fn new(auth: Arc<AuthManager>, settings: ClientSettings) -> Self {
        Self {
            auth,
            settings,
            session: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            streams: StreamTasks::new(),
            attached: Arc::new(AttachedStreams::default()),
        }
    }

    fn handles(&self) -> Result<WsHandles, ProtocolError> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.handles.clone())
            .ok_or(ProtocolError::NotConnected("websocket"))
    }

    /// 在当前会话上挂接一条流：先挂接收端，再发订阅信封。
    async fn attach_stream(
        &self,
        handles: &WsHandles,
        key: String,
        config: BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let mut rx = handles.messages.subscribe();
        send_subscribe(handles, &config).await?;

        let label = key.clone();
        let handle = tokio::spawn(async move {
            loop {
                match next_message(&mut rx).await {
                    Ok(text) => (handler.on_value)(decode_message(&config, &text)).await,
                    Err(err) => {
                        debug!(stream = %label, "websocket stream ended");
                        (handler.on_error)(&err);
                        break;
                    }
                }
            }
        });
        self.streams.insert(key, handle);
        Ok(())
    }

    fn apply_auth_headers(
        &self,
        config: &BindingConfig,
        request: &mut tokio_tungstenite::tungstenite::handshake::client::Request,
    ) {
        let Some(profile) = config.auth_profile.as_deref() else {
            return;
        };
        if config.auth_method == AuthMethod::Mtls {
            return;
        }
        let method = (config.auth_method != AuthMethod::None).then_some(config.auth_method);
        for (name, value) in self.auth.get_auth_headers(profile, method) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers_mut().insert(name, value);
                }
                _ => warn!(profile = %profile, header = %name, "invalid auth header skipped"),
            }
        }
    }
}

async fn send_text(handles: &WsHandles, text: String) -> Result<(), ProtocolError> {
    handles
        .sink
        .lock()
        .await
        .send(Message::Text(text))
        .await
        .map_err(|e| ProtocolError::Connection(e.to_string()))
}

async fn send_subscribe(handles: &WsHandles, config: &BindingConfig) -> Result<(), ProtocolError> {
    if let Some(topic) = config.topic.as_deref() {
        let envelope = json!({ "action": "subscribe", "topic": topic });
        send_text(handles, envelope.to_string()).await?;
    }
    Ok(())
}

fn decode_message(config: &BindingConfig, text: &str) -> Value {
    shape_payload(config, decode_text_payload(text.as_bytes()))
}

/// 从广播接收下一条消息；落后时跳过丢失部分继续。
async fn next_message(rx: &mut broadcast::Receiver<String>) -> Result<String, ProtocolError> {
    loop {
        match rx.recv().await {
            Ok(text) => return Ok(text),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "websocket receiver lagged");
            }
            Err(RecvError::Closed) => return Err(ProtocolError::ChannelClosed),
        }
    }
}

#[async_trait]
impl ProtocolClient for WebSocketClient {
    fn protocol(&self) -> Protocol {
        Protocol::Websocket
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let uri = require(&config.uri, "WebSocket", "uri")?;
        let mut request = uri
            .into_client_request()
            .map_err(|e| ProtocolError::Config(format!("invalid websocket uri {uri}: {e}")))?;
        self.apply_auth_headers(config, &mut request);

        let (socket, _response) = tokio::time::timeout(
            self.settings.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| ProtocolError::Timeout(format!("websocket connect to {uri}")))?
        .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        let (sink, mut source) = socket.split();
        let (messages, _) = broadcast::channel(MESSAGE_BUFFER);
        let sender = messages.clone();
        let connected = self.connected.clone();
        let attached = self.attached.clone();
        let label = uri.to_string();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(uri = %label, error = %e, "websocket read failed");
                        break;
                    }
                };
                // 没有接收者时发送失败，属正常情况
                let _ = sender.send(text);
            }
            connected.store(false, Ordering::SeqCst);
            let notified = attached.fail_all(&ProtocolError::Connection(format!(
                "websocket connection to {label} closed"
            )));
            debug!(uri = %label, streams = notified, "websocket reader stopped");
        });

        let handles = WsHandles {
            sink: Arc::new(tokio::sync::Mutex::new(sink)),
            messages,
        };
        // 旧会话上的流任务先取消，再替换会话
        self.streams.stop_all();
        let previous = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(WsSession {
                handles: handles.clone(),
                reader,
            });
        if let Some(previous) = previous {
            previous.reader.abort();
        }
        self.connected.store(true, Ordering::SeqCst);

        let mut reattached = 0usize;
        for (key, stream_config, handler) in self.attached.entries() {
            let on_error = handler.on_error.clone();
            match self.attach_stream(&handles, key.clone(), stream_config, handler).await {
                Ok(()) => reattached += 1,
                Err(err) => {
                    warn!(stream = %key, error = %err, "websocket stream reattach failed");
                    on_error(&err);
                }
            }
        }
        info!(uri = %uri, reattached, "websocket connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        self.attached.clear();
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(session) = session {
            session.reader.abort();
            if let Err(e) = session.handles.sink.lock().await.close().await {
                debug!(error = %e, "websocket close handshake failed");
            }
        }
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let handles = self.handles()?;
        let mut rx = handles.messages.subscribe();
        send_subscribe(&handles, config).await?;
        let text = tokio::time::timeout(self.settings.read_timeout, next_message(&mut rx))
            .await
            .map_err(|_| {
                ProtocolError::Timeout(format!(
                    "no websocket message within {:?}",
                    self.settings.read_timeout
                ))
            })??;
        Ok(decode_message(config, &text))
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let handles = self.handles()?;
        let text = match (config.topic.as_deref(), value) {
            (Some(topic), _) => {
                json!({ "action": "publish", "topic": topic, "data": value }).to_string()
            }
            (None, Value::String(text)) => text.clone(),
            (None, other) => other.to_string(),
        };
        send_text(&handles, text).await?;
        Ok(true)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let handles = self.handles()?;
        let key = stream_key(config);
        self.attach_stream(&handles, key.clone(), config.clone(), handler.clone())
            .await?;
        self.attached.attach(key, config.clone(), handler);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let key = stream_key(config);
        self.attached.detach(&key);
        self.streams.stop(&key);
        Ok(())
    }
}
