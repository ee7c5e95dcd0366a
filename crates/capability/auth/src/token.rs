//! OAuth2 令牌缓存

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::settings::OAuth2Settings;

/// 缓存的访问令牌；`expires_at` 为 Unix 秒。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachedToken {
    /// 仅当 `now + threshold < expires_at` 时有效。
    pub fn is_valid_at(&self, now_seconds: f64, refresh_threshold_seconds: f64) -> bool {
        now_seconds + refresh_threshold_seconds < self.expires_at
    }
}

/// 令牌刷新扩展点。
///
/// 默认不安装；未安装时缓存失效只会产生告警与空认证头。
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, profile: &str, settings: &OAuth2Settings) -> Result<CachedToken, AuthError>;
}

pub(crate) fn now_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0)
}
