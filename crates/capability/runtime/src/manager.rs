//! 协议管理器
//!
//! 每个绑定的状态机：
//!
//! ```text
//! Disconnected ─connect─► Connecting ─ok─► Connected
//!                              │                │ 流启动失败
//!                              └──fail──► Error ◄┘
//! Connected | Error ─disconnect─► Disconnected
//! ```
//!
//! 一次性读取失败只记录 `last_error`，绑定保持 Connected。
//! 流因连接丢失中断时绑定转为 Error；客户端重连后流重新收到值即回到 Connected。

use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use domain::{AttributeType, BindingConfig, BindingKey, ConnectionState, Operation};
use futures::FutureExt;
use futures::future::join_all;
use scenelink_normalize::coerce;
use scenelink_protocol::{ClientFactory, ProtocolClient, ProtocolError, StreamHandler};
use scenelink_scene::AttributeStore;
use scenelink_telemetry as telemetry;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::error::RuntimeError;
use crate::pool::{ClientPool, Lease};
use crate::subscriber::{SubscriberId, UpdateSubscriber};

/// 绑定的对外只读视图。
#[derive(Debug, Clone, Serialize)]
pub struct BindingSnapshot {
    pub key: BindingKey,
    pub config: BindingConfig,
    pub state: ConnectionState,
    pub streaming: bool,
    pub last_value: Option<Value>,
    pub last_error: Option<String>,
}

/// 单个绑定的失败记录。
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub key: BindingKey,
    pub error: String,
}

/// 批量操作结果：每个成员单独成功或失败，互不影响。
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<BindingKey>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    fn from_results(results: Vec<(BindingKey, Result<(), RuntimeError>)>) -> Self {
        let mut report = Self::default();
        for (key, result) in results {
            match result {
                Ok(()) => report.succeeded.push(key),
                Err(err) => report.failed.push(BatchFailure {
                    key,
                    error: err.to_string(),
                }),
            }
        }
        report.succeeded.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct BindingEntry {
    config: BindingConfig,
    state: ConnectionState,
    lease: Option<Lease>,
    last_value: Option<Value>,
    last_error: Option<String>,
    /// 同一绑定上的操作顺序执行
    op_lock: Arc<AsyncMutex<()>>,
}

impl BindingEntry {
    fn new(config: BindingConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            lease: None,
            last_value: None,
            last_error: None,
            op_lock: Arc::new(AsyncMutex::new(())),
        }
    }
}

struct ManagerInner {
    factory: Arc<dyn ClientFactory>,
    store: Arc<dyn AttributeStore>,
    bindings: RwLock<HashMap<BindingKey, BindingEntry>>,
    streaming: RwLock<BTreeSet<BindingKey>>,
    pool: ClientPool,
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn UpdateSubscriber>)>>,
    next_subscriber: AtomicU64,
}

impl ManagerInner {
    fn prepare(&self, key: &BindingKey) -> Result<(BindingConfig, Arc<AsyncMutex<()>>), RuntimeError> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| (entry.config.clone(), entry.op_lock.clone()))
            .ok_or_else(|| RuntimeError::BindingNotFound(key.clone()))
    }

    fn with_entry<T>(&self, key: &BindingKey, f: impl FnOnce(&mut BindingEntry) -> T) -> Option<T> {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
            .map(f)
    }

    fn set_state(&self, key: &BindingKey, state: ConnectionState, last_error: Option<String>) {
        self.with_entry(key, |entry| {
            entry.state = state;
            entry.last_error = last_error;
        });
    }

    fn note_error(&self, key: &BindingKey, message: String) {
        self.with_entry(key, |entry| entry.last_error = Some(message));
    }

    fn lease_of(&self, key: &BindingKey) -> Option<(Lease, ConnectionState)> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|entry| entry.lease.clone().map(|lease| (lease, entry.state)))
    }

    fn connected_client(&self, key: &BindingKey) -> Result<Arc<dyn ProtocolClient>, RuntimeError> {
        let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
        let entry = bindings
            .get(key)
            .ok_or_else(|| RuntimeError::BindingNotFound(key.clone()))?;
        entry
            .lease
            .as_ref()
            .filter(|lease| lease.client.is_connected())
            .map(|lease| lease.client.clone())
            .ok_or_else(|| RuntimeError::NotConnected(key.clone()))
    }

    async fn connect(&self, key: &BindingKey) -> Result<(), RuntimeError> {
        let (config, op_lock) = self.prepare(key)?;
        let _op = op_lock.lock().await;

        let held = self.lease_of(key);
        if let Some((lease, ConnectionState::Connected)) = &held {
            if lease.client.is_connected() {
                return Ok(());
            }
        }
        self.set_state(key, ConnectionState::Connecting, None);

        let lease = match held {
            Some((lease, _)) => lease,
            None => {
                let pool_key = config.pool_key();
                let Some(lease) = self
                    .pool
                    .acquire(&pool_key, || self.factory.create(config.protocol))
                else {
                    let err = RuntimeError::UnsupportedProtocol(config.protocol);
                    error!(target: "scenelink.runtime", binding = %key, error = %err, "no client for protocol");
                    self.set_state(key, ConnectionState::Error, Some(err.to_string()));
                    return Err(err);
                };
                let attached = self
                    .with_entry(key, |entry| entry.lease = Some(lease.clone()))
                    .is_some();
                if !attached {
                    self.release(&lease).await;
                    return Err(RuntimeError::BindingNotFound(key.clone()));
                }
                lease
            }
        };

        let outcome = {
            let _gate = lease.gate.lock().await;
            if lease.client.is_connected() {
                Ok(())
            } else {
                lease.client.connect(&config).await
            }
        };
        match outcome {
            Ok(()) => {
                telemetry::record_connect_success();
                self.set_state(key, ConnectionState::Connected, None);
                info!(
                    target: "scenelink.runtime",
                    binding = %key,
                    protocol = %config.protocol,
                    pool_key = %lease.pool_key,
                    "binding connected"
                );
                Ok(())
            }
            Err(err) => {
                telemetry::record_connect_failure();
                error!(target: "scenelink.runtime", binding = %key, error = %err, "connect failed");
                self.set_state(key, ConnectionState::Error, Some(err.to_string()));
                Err(err.into())
            }
        }
    }

    async fn disconnect(&self, key: &BindingKey) -> Result<(), RuntimeError> {
        let (config, op_lock) = self.prepare(key)?;
        let _op = op_lock.lock().await;

        let lease = self
            .with_entry(key, |entry| {
                entry.state = ConnectionState::Disconnected;
                entry.lease.take()
            })
            .flatten();
        let Some(lease) = lease else {
            return Ok(());
        };

        match lease.client.stop_stream(&config).await {
            Ok(()) if config.operation == Operation::Stream => telemetry::record_stream_stopped(),
            Ok(()) | Err(ProtocolError::NotSupported(_)) => {}
            Err(err) => warn!(binding = %key, error = %err, "stop stream failed"),
        }
        self.release(&lease).await;
        info!(target: "scenelink.runtime", binding = %key, "binding disconnected");
        Ok(())
    }

    /// 归还池引用；最后一个持有者负责断开客户端。
    async fn release(&self, lease: &Lease) {
        let Some(last) = self.pool.release(&lease.pool_key) else {
            debug!(pool_key = %lease.pool_key, "pooled client still shared");
            return;
        };
        let _gate = last.gate.lock().await;
        if let Err(err) = last.client.disconnect().await {
            warn!(pool_key = %last.pool_key, error = %err, "client disconnect failed");
        }
    }

    async fn refresh(&self, key: &BindingKey) -> Result<Value, RuntimeError> {
        let (config, op_lock) = self.prepare(key)?;
        let _op = op_lock.lock().await;
        let client = self.connected_client(key)?;

        match client.read(&config).await {
            Ok(value) => {
                self.propagate(key, value.clone()).await;
                Ok(value)
            }
            Err(err) => {
                telemetry::record_read_failure();
                warn!(target: "scenelink.runtime", binding = %key, error = %err, "read failed");
                self.note_error(key, err.to_string());
                Err(err.into())
            }
        }
    }

    async fn write(&self, key: &BindingKey, value: &Value) -> Result<bool, RuntimeError> {
        if self.connected_client(key).is_err() {
            self.connect(key).await?;
        }
        let (config, op_lock) = self.prepare(key)?;
        let _op = op_lock.lock().await;
        let client = self.connected_client(key)?;

        match client.write(&config, value).await {
            Ok(accepted) => {
                telemetry::record_write(accepted);
                debug!(binding = %key, accepted, "value written");
                Ok(accepted)
            }
            Err(err) => {
                telemetry::record_write(false);
                warn!(target: "scenelink.runtime", binding = %key, error = %err, "write failed");
                self.note_error(key, err.to_string());
                Err(err.into())
            }
        }
    }

    async fn start_stream(self: &Arc<Self>, key: &BindingKey) -> Result<(), RuntimeError> {
        self.connect(key).await?;
        let (config, op_lock) = self.prepare(key)?;
        let _op = op_lock.lock().await;
        let client = self.connected_client(key)?;

        match client.start_stream(&config, self.stream_handler(key.clone())).await {
            Ok(()) => {
                telemetry::record_stream_started();
                info!(target: "scenelink.runtime", binding = %key, "stream started");
                Ok(())
            }
            Err(err) => {
                error!(target: "scenelink.runtime", binding = %key, error = %err, "stream start failed");
                self.set_state(key, ConnectionState::Error, Some(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// 流回调只持有弱引用，管理器释放后回调变为空操作。
    fn stream_handler(self: &Arc<Self>, key: BindingKey) -> StreamHandler {
        let inner = Arc::downgrade(self);
        let value_key = key.clone();
        let on_value = Arc::new(move |value: Value| {
            let inner = inner.clone();
            let key = value_key.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    inner.stream_resumed(&key);
                    inner.propagate(&key, value).await;
                }
            }
            .boxed()
        });

        let inner = Arc::downgrade(self);
        let on_error = Arc::new(move |err: &ProtocolError| {
            if let Some(inner) = inner.upgrade() {
                inner.stream_lost(&key, err);
            }
        });
        StreamHandler::new(on_value).with_error(on_error)
    }

    /// 流中断：仍持有客户端的已连接绑定转为 Error。
    fn stream_lost(&self, key: &BindingKey, err: &ProtocolError) {
        let changed = self
            .with_entry(key, |entry| {
                let live = entry.lease.is_some() && entry.state == ConnectionState::Connected;
                if live {
                    entry.state = ConnectionState::Error;
                    entry.last_error = Some(err.to_string());
                }
                live
            })
            .unwrap_or(false);
        if changed {
            error!(target: "scenelink.runtime", binding = %key, error = %err, "stream interrupted");
        }
    }

    /// 流中断后重新收到值：回到 Connected。
    fn stream_resumed(&self, key: &BindingKey) {
        let changed = self
            .with_entry(key, |entry| {
                let recovered = entry.lease.is_some() && entry.state == ConnectionState::Error;
                if recovered {
                    entry.state = ConnectionState::Connected;
                    entry.last_error = None;
                }
                recovered
            })
            .unwrap_or(false);
        if changed {
            info!(target: "scenelink.runtime", binding = %key, "stream resumed");
        }
    }

    /// 值传播：记录原始值 → 按属性类型转换 → 写回属性 → 通知订阅者。
    async fn propagate(&self, key: &BindingKey, raw: Value) {
        telemetry::record_value_received();
        let attribute_type = {
            let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = bindings.get_mut(key) else {
                debug!(binding = %key, "value for unregistered binding dropped");
                return;
            };
            entry.last_value = Some(raw.clone());
            entry
                .config
                .attribute_type
                .as_deref()
                .map(AttributeType::from_type_name)
                .unwrap_or_else(|| AttributeType::Other(String::new()))
        };

        match coerce(&raw, &attribute_type) {
            Ok(typed) => {
                let stored = self
                    .store
                    .set_value(&key.entity_path, &key.attribute_name, &typed)
                    .await;
                match stored {
                    Ok(()) => {
                        telemetry::record_value_applied();
                        debug!(binding = %key, value = %raw, "attribute updated");
                    }
                    Err(err) => {
                        telemetry::record_store_failure();
                        warn!(binding = %key, error = %err, "attribute write-back failed");
                        self.note_error(key, err.to_string());
                    }
                }
            }
            Err(err) => {
                telemetry::record_conversion_failure();
                warn!(
                    target: "scenelink.runtime",
                    binding = %key,
                    value = %raw,
                    error = %err,
                    "type conversion failed, attribute left unchanged"
                );
                self.note_error(key, err.to_string());
            }
        }

        self.notify(key, &raw);
    }

    fn notify(&self, key: &BindingKey, raw: &Value) {
        let subscribers: Vec<(SubscriberId, Arc<dyn UpdateSubscriber>)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (id, subscriber) in subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                subscriber.on_update(&key.entity_path, &key.attribute_name, raw)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    telemetry::record_subscriber_failure();
                    error!(binding = %key, subscriber = id, error = %err, "subscriber failed");
                }
                Err(_) => {
                    telemetry::record_subscriber_failure();
                    error!(binding = %key, subscriber = id, "subscriber panicked");
                }
            }
        }
    }

    fn connected_keys(&self) -> Vec<BindingKey> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| entry.lease.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn streaming_keys(&self) -> Vec<BindingKey> {
        self.streaming
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    async fn disconnect_all(&self, keys: Vec<BindingKey>) -> BatchReport {
        let results = join_all(keys.into_iter().map(|key| async move {
            let result = self.disconnect(&key).await;
            (key, result)
        }))
        .await;
        BatchReport::from_results(results)
    }
}

/// 协议管理器：绑定注册表、连接池、状态机、值传播。
///
/// 克隆共享同一份状态。
#[derive(Clone)]
pub struct ProtocolManager {
    inner: Arc<ManagerInner>,
}

impl ProtocolManager {
    pub fn new(factory: Arc<dyn ClientFactory>, store: Arc<dyn AttributeStore>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                factory,
                store,
                bindings: RwLock::new(HashMap::new()),
                streaming: RwLock::new(BTreeSet::new()),
                pool: ClientPool::default(),
                subscribers: RwLock::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// 注册绑定。
    ///
    /// 必填字段缺失时返回 [`RuntimeError::ConfigValidation`]，不进入注册表。
    /// `read` 绑定立即连接并读取一次，`stream` 绑定只加入流式集合等待启动；
    /// 连接或读取失败记录在绑定上，不作为注册失败返回。
    pub async fn register_binding(
        &self,
        entity_path: &str,
        attribute_name: &str,
        mut config: BindingConfig,
    ) -> Result<(), RuntimeError> {
        config.entity_path = entity_path.to_string();
        config.attribute_name = attribute_name.to_string();
        let key = config.key();

        let errors = config.validation_errors();
        if !errors.is_empty() {
            warn!(target: "scenelink.runtime", binding = %key, errors = ?errors, "binding rejected");
            return Err(RuntimeError::ConfigValidation(errors));
        }

        let exists = self
            .inner
            .bindings
            .read()
            .map(|bindings| bindings.contains_key(&key))
            .unwrap_or(false);
        if exists {
            debug!(binding = %key, "replacing existing binding");
            self.inner.disconnect(&key).await?;
        }

        let operation = config.operation;
        let protocol = config.protocol;
        self.inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), BindingEntry::new(config));
        {
            let mut streaming = self
                .inner
                .streaming
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if operation == Operation::Stream {
                streaming.insert(key.clone());
            } else {
                streaming.remove(&key);
            }
        }
        info!(
            target: "scenelink.runtime",
            binding = %key,
            protocol = %protocol,
            operation = %operation,
            "binding registered"
        );

        match operation {
            Operation::Read => {
                if self.inner.connect(&key).await.is_ok() {
                    // 失败已记录在 last_error
                    let _ = self.inner.refresh(&key).await;
                }
            }
            Operation::Connect => {
                let _ = self.inner.connect(&key).await;
            }
            Operation::Stream | Operation::Write | Operation::Disconnect => {}
        }
        Ok(())
    }

    /// 以配置自带的实体路径与属性名注册。
    pub async fn register_config(&self, config: BindingConfig) -> Result<(), RuntimeError> {
        let entity_path = config.entity_path.clone();
        let attribute_name = config.attribute_name.clone();
        self.register_binding(&entity_path, &attribute_name, config)
            .await
    }

    pub async fn connect_binding(&self, key: &BindingKey) -> Result<(), RuntimeError> {
        self.inner.connect(key).await
    }

    /// 断开绑定；未连接时为空操作。共享客户端在仍有其他绑定引用时保持连接。
    pub async fn disconnect_binding(&self, key: &BindingKey) -> Result<(), RuntimeError> {
        self.inner.disconnect(key).await
    }

    /// 对已连接的绑定执行一次读取并传播结果。
    pub async fn refresh_binding(&self, key: &BindingKey) -> Result<Value, RuntimeError> {
        self.inner.refresh(key).await
    }

    /// 写入值；绑定未连接时先连接。
    pub async fn write_binding(&self, key: &BindingKey, value: &Value) -> Result<bool, RuntimeError> {
        self.inner.write(key, value).await
    }

    /// 断开并移除实体下的全部绑定，返回移除数量。
    pub async fn unregister_entity(&self, entity_path: &str) -> usize {
        let keys: Vec<BindingKey> = self
            .inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.entity_path == entity_path)
            .cloned()
            .collect();
        for key in &keys {
            if let Err(err) = self.inner.disconnect(key).await {
                warn!(binding = %key, error = %err, "disconnect during unregister failed");
            }
        }

        let mut bindings = self.inner.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let mut streaming = self.inner.streaming.write().unwrap_or_else(PoisonError::into_inner);
        let removed = keys
            .iter()
            .filter(|key| {
                streaming.remove(*key);
                bindings.remove(*key).is_some()
            })
            .count();
        info!(target: "scenelink.runtime", entity = %entity_path, removed, "entity unregistered");
        removed
    }

    /// 并发启动全部流式绑定，单个失败不影响其他绑定。
    pub async fn start_streaming_connections(&self) -> BatchReport {
        let keys = self.inner.streaming_keys();
        let inner = &self.inner;
        let results = join_all(keys.into_iter().map(|key| async move {
            let result = inner.start_stream(&key).await;
            (key, result)
        }))
        .await;
        let report = BatchReport::from_results(results);
        info!(
            target: "scenelink.runtime",
            started = report.succeeded.len(),
            failed = report.failed.len(),
            "streaming connections started"
        );
        report
    }

    /// 并发断开全部流式绑定。
    pub async fn stop_streaming_connections(&self) -> BatchReport {
        let report = self.inner.disconnect_all(self.inner.streaming_keys()).await;
        info!(
            target: "scenelink.runtime",
            stopped = report.succeeded.len(),
            failed = report.failed.len(),
            "streaming connections stopped"
        );
        report
    }

    /// 并发断开所有持有客户端的绑定。
    pub async fn stop_all_connections(&self) -> BatchReport {
        self.inner.disconnect_all(self.inner.connected_keys()).await
    }

    /// 全部绑定快照，按绑定键排序。
    pub fn bindings(&self) -> Vec<BindingSnapshot> {
        let streaming = self
            .inner
            .streaming
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut snapshots: Vec<BindingSnapshot> = self
            .inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, entry)| snapshot(key, entry, streaming.contains(key)))
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    pub fn binding(&self, key: &BindingKey) -> Option<BindingSnapshot> {
        let streaming = self
            .inner
            .streaming
            .read()
            .map(|streaming| streaming.contains(key))
            .unwrap_or(false);
        self.inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| snapshot(key, entry, streaming))
    }

    /// 绑定当前持有的客户端实例（用于确认连接池共享）。
    pub fn client_for(&self, key: &BindingKey) -> Option<Arc<dyn ProtocolClient>> {
        self.inner
            .lease_of(key)
            .map(|(lease, _)| lease.client)
    }

    pub fn streaming_bindings(&self) -> Vec<BindingKey> {
        self.inner.streaming_keys()
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool.len()
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn UpdateSubscriber>) -> SubscriberId {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// 断开全部绑定并清空注册表、流式集合、连接池与订阅者。可重复调用。
    pub async fn shutdown(&self) {
        let report = self.stop_all_connections().await;
        for failure in &report.failed {
            warn!(binding = %failure.key, error = %failure.error, "disconnect during shutdown failed");
        }

        self.inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner
            .streaming
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        for lease in self.inner.pool.drain() {
            let _gate = lease.gate.lock().await;
            if let Err(err) = lease.client.disconnect().await {
                warn!(pool_key = %lease.pool_key, error = %err, "client disconnect failed");
            }
        }
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!(target: "scenelink.runtime", disconnected = report.succeeded.len(), "protocol manager shut down");
    }
}

fn snapshot(key: &BindingKey, entry: &BindingEntry, streaming: bool) -> BindingSnapshot {
    BindingSnapshot {
        key: key.clone(),
        config: entry.config.clone(),
        state: entry.state,
        streaming,
        last_value: entry.last_value.clone(),
        last_error: entry.last_error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_report_sorts_and_splits_results() {
        let report = BatchReport::from_results(vec![
            (BindingKey::new("/World/B", "x"), Ok(())),
            (
                BindingKey::new("/World/C", "y"),
                Err(RuntimeError::NotConnected(BindingKey::new("/World/C", "y"))),
            ),
            (BindingKey::new("/World/A", "x"), Ok(())),
        ]);

        assert!(!report.is_success());
        assert_eq!(
            report.succeeded,
            vec![BindingKey::new("/World/A", "x"), BindingKey::new("/World/B", "x")]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].error, "binding not connected: /World/C.y");
    }
}
