//! File 客户端实现
//!
//! URI 为 `file://path` 或裸路径。流式读取按 `refreshPolicy`（默认 5 秒）轮询
//! 文件修改时间，只有 mtime 前进时才重新读取并回调。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use domain::{refresh_interval, BindingConfig, Protocol};
use scenelink_normalize::decode_file_content;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{require, shape_payload, stream_key, ProtocolClient, StreamHandler};
use crate::error::ProtocolError;
use crate::stream::StreamTasks;

const URI_PREFIX: &str = "file://";

/// 从绑定 uri 得到本地路径。
pub fn file_path(config: &BindingConfig) -> Result<PathBuf, ProtocolError> {
    let uri = require(&config.uri, "File", "uri")?;
    Ok(PathBuf::from(uri.strip_prefix(URI_PREFIX).unwrap_or(uri)))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
}

async fn load(path: &Path, config: &BindingConfig) -> Result<Value, ProtocolError> {
    if !tokio::fs::try_exists(path).await? {
        warn!(path = %path.display(), "file does not exist");
        return Ok(Value::Null);
    }
    let content = tokio::fs::read_to_string(path).await?;
    Ok(shape_payload(config, decode_file_content(path, &content)))
}

/// File 协议客户端
#[derive(Default)]
pub struct FileClient {
    connected: AtomicBool,
    streams: StreamTasks,
}

impl FileClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProtocolClient for FileClient {
    fn protocol(&self) -> Protocol {
        Protocol::File
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let path = file_path(config)?;
        if !tokio::fs::try_exists(&path).await? {
            warn!(path = %path.display(), "file does not exist yet");
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(path = %path.display(), "file binding ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let path = file_path(config)?;
        load(&path, config).await
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let path = file_path(config)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = match value {
            _ if is_json(&path) => serde_json::to_string_pretty(value)
                .map_err(|e| ProtocolError::DataParse(e.to_string()))?,
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "file written");
        Ok(true)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let on_value = handler.on_value;
        let path = file_path(config)?;
        let every = refresh_interval(config, Protocol::File.default_poll_seconds().unwrap_or(5.0));
        let key = stream_key(config);
        let label = key.clone();
        let config = config.clone();
        let mut last_modified = modified_at(&path).await;

        let handle = tokio::spawn(async move {
            debug!(stream = %label, path = %path.display(), "file watch started");
            loop {
                tokio::time::sleep(every).await;
                let Some(current) = modified_at(&path).await else {
                    continue;
                };
                if last_modified.is_some_and(|last| current <= last) {
                    continue;
                }
                last_modified = Some(current);
                match load(&path, &config).await {
                    Ok(value) => on_value(value).await,
                    Err(e) => warn!(stream = %label, error = %e, "file read failed"),
                }
            }
        });
        self.streams.insert(key, handle);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.streams.stop(&stream_key(config));
        Ok(())
    }
}
