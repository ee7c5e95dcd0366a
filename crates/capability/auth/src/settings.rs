//! 认证档案与各类型凭据文件的结构
//!
//! `profiles.json`：`{"profiles": {"<name>": {"type": "...", "config_file": "...", "description": "..."}}}`，
//! 凭据文件路径相对认证目录。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 认证档案条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthProfile {
    #[serde(rename = "type", default)]
    pub profile_type: Option<String>,
    #[serde(default)]
    pub config_file: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, AuthProfile>,
}

/// OAuth2 凭据文件。
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Settings {
    #[serde(default)]
    pub token_format: TokenFormat,
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub token_cache: TokenCacheSettings,
    /// 授权端点、client_id 等，留给令牌刷新扩展使用。
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenFormat {
    #[serde(default = "default_header_name")]
    pub header_name: String,
    #[serde(default = "default_header_value_template")]
    pub header_value_template: String,
}

impl Default for TokenFormat {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            header_value_template: default_header_value_template(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenCacheSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cache_file: Option<String>,
    #[serde(default = "default_refresh_threshold_seconds")]
    pub refresh_threshold_seconds: f64,
}

impl Default for TokenCacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_file: None,
            refresh_threshold_seconds: default_refresh_threshold_seconds(),
        }
    }
}

/// API Key 凭据文件。
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_key_name")]
    pub key_name: String,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

fn default_header_value_template() -> String {
    "Bearer {access_token}".to_string()
}

fn default_refresh_threshold_seconds() -> f64 {
    300.0
}

fn default_key_name() -> String {
    "X-API-Key".to_string()
}
