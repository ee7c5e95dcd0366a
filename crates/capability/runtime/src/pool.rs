//! 客户端连接池
//!
//! 键为 `protocol://uri#authProfile`，每个绑定持有一份引用；
//! 引用归零时条目移除，由调用方断开客户端。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use scenelink_protocol::ProtocolClient;

/// 绑定持有的池化客户端引用。
///
/// `gate` 串行化同一客户端上的连接与断开，避免兄弟绑定并发重复连接。
#[derive(Clone)]
pub(crate) struct Lease {
    pub pool_key: String,
    pub client: Arc<dyn ProtocolClient>,
    pub gate: Arc<tokio::sync::Mutex<()>>,
}

struct PooledClient {
    lease: Lease,
    refs: usize,
}

#[derive(Default)]
pub(crate) struct ClientPool {
    entries: Mutex<HashMap<String, PooledClient>>,
}

impl ClientPool {
    /// 复用已有客户端或用 `create` 新建，引用计数加一。
    pub fn acquire(
        &self,
        pool_key: &str,
        create: impl FnOnce() -> Option<Arc<dyn ProtocolClient>>,
    ) -> Option<Lease> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pooled) = entries.get_mut(pool_key) {
            pooled.refs += 1;
            return Some(pooled.lease.clone());
        }
        let lease = Lease {
            pool_key: pool_key.to_string(),
            client: create()?,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        };
        entries.insert(
            pool_key.to_string(),
            PooledClient {
                lease: lease.clone(),
                refs: 1,
            },
        );
        Some(lease)
    }

    /// 引用计数减一；归零时移除并返回该客户端。
    pub fn release(&self, pool_key: &str) -> Option<Lease> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let pooled = entries.get_mut(pool_key)?;
        pooled.refs = pooled.refs.saturating_sub(1);
        if pooled.refs > 0 {
            return None;
        }
        entries.remove(pool_key).map(|pooled| pooled.lease)
    }

    #[cfg(test)]
    pub fn refs(&self, pool_key: &str) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.get(pool_key).map_or(0, |pooled| pooled.refs))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// 清空连接池，返回全部客户端。
    pub fn drain(&self) -> Vec<Lease> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, pooled)| pooled.lease)
            .collect()
    }
}
