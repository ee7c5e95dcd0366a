//! 运行时配置加载。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 运行时配置。
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// 认证档案目录（含 profiles.json）
    pub auth_dir: PathBuf,
    /// 宿主启动时加载的场景文档
    pub scene_file: Option<PathBuf>,
    pub http_addr: String,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    pub mqtt_keep_alive: Duration,
    /// 启动后立即开启流式绑定
    pub autostart_streaming: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("auth"),
            scene_file: None,
            http_addr: "127.0.0.1:8090".to_string(),
            read_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            mqtt_keep_alive: Duration::from_secs(30),
            autostart_streaming: false,
        }
    }
}

impl RuntimeConfig {
    /// 从环境变量读取配置，未设置的项使用默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let auth_dir = read_optional("SCENELINK_AUTH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.auth_dir);
        let scene_file = read_optional("SCENELINK_SCENE_FILE").map(PathBuf::from);
        let http_addr = read_optional("SCENELINK_HTTP_ADDR").unwrap_or(defaults.http_addr);
        let read_timeout = read_seconds_with_default(
            "SCENELINK_READ_TIMEOUT_SECONDS",
            defaults.read_timeout,
        )?;
        let connect_timeout = read_seconds_with_default(
            "SCENELINK_CONNECT_TIMEOUT_SECONDS",
            defaults.connect_timeout,
        )?;
        let http_timeout = read_seconds_with_default(
            "SCENELINK_HTTP_TIMEOUT_SECONDS",
            defaults.http_timeout,
        )?;
        let mqtt_keep_alive = read_seconds_with_default(
            "SCENELINK_MQTT_KEEP_ALIVE_SECONDS",
            defaults.mqtt_keep_alive,
        )?;
        let autostart_streaming =
            read_bool_with_default("SCENELINK_AUTOSTART_STREAMING", defaults.autostart_streaming);

        Ok(Self {
            auth_dir,
            scene_file,
            http_addr,
            read_timeout,
            connect_timeout,
            http_timeout,
            mqtt_keep_alive,
            autostart_streaming,
        })
    }
}

/// 读取正整数秒；0 视为非法。
fn read_seconds_with_default(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
