//! 认证能力：认证档案解析、OAuth2 令牌缓存、API Key 头、mTLS 证书与 SQL 连接串。
//!
//! 认证目录结构：
//!
//! ```text
//! auth/
//! ├── profiles.json          {"profiles": {"plant-api": {"type": "apikey", "config_file": "apikey/plant.json"}}}
//! ├── apikey/plant.json      {"api_key": "${PLANT_API_KEY}", "key_name": "X-API-Key"}
//! ├── oauth2/erp.json        {"token_cache": {"enabled": true, "cache_file": "oauth2/erp_token.json"}}
//! ├── mtls/broker.json       {"client_cert_path": "client.crt", "client_key_path": "client.key"}
//! └── sql/historian.json     {"connection_string": "postgres://${DB_USER}@db/historian"}
//! ```

mod env;
mod error;
mod manager;
mod settings;
mod token;

pub use env::substitute_env_vars;
pub use error::AuthError;
pub use manager::{AuthHeaders, AuthManager, MtlsMaterial, ProfileValidation};
pub use settings::{ApiKeySettings, AuthProfile, OAuth2Settings, TokenCacheSettings, TokenFormat};
pub use token::{CachedToken, TokenRefresher};
