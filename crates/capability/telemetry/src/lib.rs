//! 追踪、请求 ID 与绑定计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 绑定计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub values_received: u64,
    pub values_applied: u64,
    pub conversion_failures: u64,
    pub store_failures: u64,
    pub subscriber_failures: u64,
    pub reads_failed: u64,
    pub connects_succeeded: u64,
    pub connects_failed: u64,
    pub writes_succeeded: u64,
    pub writes_failed: u64,
    pub streams_started: u64,
    pub streams_stopped: u64,
}

/// 进程级绑定计数器。
#[derive(Default)]
pub struct BindingMetrics {
    values_received: AtomicU64,
    values_applied: AtomicU64,
    conversion_failures: AtomicU64,
    store_failures: AtomicU64,
    subscriber_failures: AtomicU64,
    reads_failed: AtomicU64,
    connects_succeeded: AtomicU64,
    connects_failed: AtomicU64,
    writes_succeeded: AtomicU64,
    writes_failed: AtomicU64,
    streams_started: AtomicU64,
    streams_stopped: AtomicU64,
}

impl BindingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            values_received: self.values_received.load(Ordering::Relaxed),
            values_applied: self.values_applied.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            subscriber_failures: self.subscriber_failures.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            connects_succeeded: self.connects_succeeded.load(Ordering::Relaxed),
            connects_failed: self.connects_failed.load(Ordering::Relaxed),
            writes_succeeded: self.writes_succeeded.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_stopped: self.streams_stopped.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<BindingMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static BindingMetrics {
    METRICS.get_or_init(BindingMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的原始值（读取或流回调）。
pub fn record_value_received() {
    metrics().values_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功写回属性的值。
pub fn record_value_applied() {
    metrics().values_applied.fetch_add(1, Ordering::Relaxed);
}

/// 记录类型转换失败。
pub fn record_conversion_failure() {
    metrics()
        .conversion_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录属性写回失败。
pub fn record_store_failure() {
    metrics().store_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅者回调失败。
pub fn record_subscriber_failure() {
    metrics()
        .subscriber_failures
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_read_failure() {
    metrics().reads_failed.fetch_add(1, Ordering::Relaxed);
}

pub fn record_connect_success() {
    metrics().connects_succeeded.fetch_add(1, Ordering::Relaxed);
}

pub fn record_connect_failure() {
    metrics().connects_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录协议写入结果。
pub fn record_write(success: bool) {
    let counter = if success {
        &metrics().writes_succeeded
    } else {
        &metrics().writes_failed
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_stream_started() {
    metrics().streams_started.fetch_add(1, Ordering::Relaxed);
}

pub fn record_stream_stopped() {
    metrics().streams_stopped.fetch_add(1, Ordering::Relaxed);
}
