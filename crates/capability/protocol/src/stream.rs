//! 流任务注册表与轮询循环

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use domain::BindingConfig;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{StreamHandler, ValueCallback};
use crate::error::ProtocolError;

/// 按绑定键保存后台流任务；停止即取消任务，任务在下一个挂起点结束。
#[derive(Default)]
pub struct StreamTasks {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl StreamTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记任务；同键已有任务时取消旧任务并返回 `true`。
    pub fn insert(&self, key: String, handle: JoinHandle<()>) -> bool {
        let previous = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handle);
        match previous {
            Some(previous) => {
                previous.abort();
                true
            }
            None => false,
        }
    }

    /// 停止指定键的任务，返回是否存在。
    pub fn stop(&self, key: &str) -> bool {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// 停止全部任务，返回停止数量。
    pub fn stop_all(&self) -> usize {
        let drained: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in &drained {
            handle.abort();
        }
        drained.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.get(key).is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for StreamTasks {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// 推送式流的登记表。
///
/// 记录每条流的配置与回调：连接重建后据此重新挂接，连接丢失时逐个通知。
#[derive(Default)]
pub(crate) struct AttachedStreams {
    entries: Mutex<HashMap<String, (BindingConfig, StreamHandler)>>,
}

impl AttachedStreams {
    pub fn attach(&self, key: String, config: BindingConfig, handler: StreamHandler) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, (config, handler));
    }

    pub fn detach(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn entries(&self) -> Vec<(String, BindingConfig, StreamHandler)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, (config, handler))| (key.clone(), config.clone(), handler.clone()))
            .collect()
    }

    /// 通知全部已登记的流连接已中断，登记保留以便重连后挂接。
    pub fn fail_all(&self, err: &ProtocolError) -> usize {
        let entries = self.entries();
        for (key, _, handler) in &entries {
            debug!(stream = %key, error = %err, "stream interrupted");
            (handler.on_error)(err);
        }
        entries.len()
    }
}

/// 轮询式流：取值 → 回调 → 休眠，取值失败只记录日志并继续。
pub(crate) fn spawn_poller<F, Fut>(
    label: String,
    every: Duration,
    fetch: F,
    on_value: ValueCallback,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, ProtocolError>> + Send + 'static,
{
    tokio::spawn(async move {
        debug!(stream = %label, interval_ms = every.as_millis() as u64, "polling stream started");
        loop {
            match fetch().await {
                Ok(value) => on_value(value).await,
                Err(e) => warn!(stream = %label, error = %e, "poll failed"),
            }
            tokio::time::sleep(every).await;
        }
    })
}
