use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use domain::AuthMethod;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::env::substitute_env_vars;
use crate::error::AuthError;
use crate::settings::{ApiKeySettings, AuthProfile, OAuth2Settings, ProfilesFile};
use crate::token::{CachedToken, TokenRefresher, now_seconds};

/// 认证头：头名 → 头值。
pub type AuthHeaders = BTreeMap<String, String>;

/// mTLS 证书材料的绝对路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: Option<PathBuf>,
}

/// 档案校验结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileValidation {
    pub valid: bool,
    pub message: String,
}

impl ProfileValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            message: "Profile validation successful".to_string(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// 认证管理器。
///
/// 启动时读取 `<auth_dir>/profiles.json`，之后按需读取各档案的凭据文件。
/// OAuth2 只使用缓存令牌；缓存缺失或过期时返回空认证头，除非安装了 [`TokenRefresher`]。
pub struct AuthManager {
    auth_dir: PathBuf,
    profiles: BTreeMap<String, AuthProfile>,
    tokens: RwLock<HashMap<String, CachedToken>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl AuthManager {
    /// 加载认证目录；档案文件缺失只告警，解析失败记录错误，两者都得到空档案集。
    pub fn load(auth_dir: impl Into<PathBuf>) -> Self {
        let auth_dir = auth_dir.into();
        let profiles_path = auth_dir.join("profiles.json");
        let profiles = if profiles_path.exists() {
            match read_json::<ProfilesFile>(&profiles_path) {
                Ok(file) => {
                    info!(count = file.profiles.len(), "loaded auth profiles");
                    file.profiles
                }
                Err(err) => {
                    error!(path = %profiles_path.display(), error = %err, "failed to load auth profiles");
                    BTreeMap::new()
                }
            }
        } else {
            warn!(path = %profiles_path.display(), "auth profiles file not found");
            BTreeMap::new()
        };
        Self {
            auth_dir,
            profiles,
            tokens: RwLock::new(HashMap::new()),
            refresher: None,
        }
    }

    /// 无任何档案的管理器（所有绑定按未认证处理）。
    pub fn empty() -> Self {
        Self {
            auth_dir: PathBuf::new(),
            profiles: BTreeMap::new(),
            tokens: RwLock::new(HashMap::new()),
            refresher: None,
        }
    }

    pub fn with_token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn auth_dir(&self) -> &Path {
        &self.auth_dir
    }

    pub fn list_profiles(&self) -> BTreeMap<String, AuthProfile> {
        self.profiles.clone()
    }

    pub fn profile(&self, name: &str) -> Option<&AuthProfile> {
        self.profiles.get(name)
    }

    /// 生成认证头；档案缺失或类型不支持时返回空表。
    pub fn get_auth_headers(&self, profile: &str, method: Option<AuthMethod>) -> AuthHeaders {
        match self.try_auth_headers(profile, method) {
            Ok(headers) => headers,
            Err(err) => {
                warn!(profile = %profile, error = %err, "auth headers unavailable");
                AuthHeaders::new()
            }
        }
    }

    /// 读取档案的凭据文件（已做环境变量替换）；失败时返回空表。
    pub fn get_connection_config(&self, profile: &str) -> Map<String, Value> {
        match self.try_connection_config(profile) {
            Ok(config) => config,
            Err(err) => {
                warn!(profile = %profile, error = %err, "connection config unavailable");
                Map::new()
            }
        }
    }

    /// mTLS 证书路径；相对路径以凭据文件所在目录为基准。
    pub fn get_mtls_config(&self, profile: &str) -> Option<MtlsMaterial> {
        match self.try_mtls_config(profile) {
            Ok(material) => Some(material),
            Err(err) => {
                warn!(profile = %profile, error = %err, "mtls config unavailable");
                None
            }
        }
    }

    pub fn get_sql_connection_string(&self, profile: &str) -> Option<String> {
        match self.try_sql_connection_string(profile) {
            Ok(connection_string) => Some(connection_string),
            Err(err) => {
                warn!(profile = %profile, error = %err, "connection string unavailable");
                None
            }
        }
    }

    /// 按档案类型做可用性检查。
    pub fn validate_profile(&self, profile: &str) -> ProfileValidation {
        if profile.is_empty() {
            return ProfileValidation::fail("No auth profile specified");
        }
        let Some(entry) = self.profiles.get(profile) else {
            return ProfileValidation::fail(format!("Auth profile '{profile}' not found"));
        };
        let Some(profile_type) = entry.profile_type.as_deref() else {
            return ProfileValidation::fail("Auth type not specified in profile");
        };

        match profile_type {
            "oauth2" | "apikey" => {
                if self.get_auth_headers(profile, None).is_empty() {
                    return ProfileValidation::fail(format!(
                        "Could not generate auth headers for {profile_type}"
                    ));
                }
            }
            "mtls" => {
                let Some(material) = self.get_mtls_config(profile) else {
                    return ProfileValidation::fail(
                        "Could not load mTLS certificate configuration",
                    );
                };
                if !material.cert_path.exists() {
                    return ProfileValidation::fail(format!(
                        "Client certificate not found: {}",
                        material.cert_path.display()
                    ));
                }
                if !material.key_path.exists() {
                    return ProfileValidation::fail(format!(
                        "Private key not found: {}",
                        material.key_path.display()
                    ));
                }
            }
            "connection_string" => {
                if self.get_sql_connection_string(profile).is_none() {
                    return ProfileValidation::fail("Could not generate connection string");
                }
            }
            _ => {}
        }
        ProfileValidation::ok()
    }

    fn entry(&self, profile: &str) -> Result<&AuthProfile, AuthError> {
        self.profiles
            .get(profile)
            .ok_or_else(|| AuthError::ProfileNotFound(profile.to_string()))
    }

    fn try_auth_headers(
        &self,
        profile: &str,
        method: Option<AuthMethod>,
    ) -> Result<AuthHeaders, AuthError> {
        let entry = self.entry(profile)?;
        let auth_type = entry
            .profile_type
            .clone()
            .or_else(|| method.map(|method| method.as_str().to_string()))
            .unwrap_or_default();
        match auth_type.as_str() {
            "oauth2" => self.oauth2_headers(profile, entry),
            "apikey" => self.apikey_headers(entry),
            other => Err(AuthError::WrongProfileType {
                profile: profile.to_string(),
                expected: "oauth2 or apikey",
                actual: other.to_string(),
            }),
        }
    }

    fn oauth2_headers(&self, profile: &str, entry: &AuthProfile) -> Result<AuthHeaders, AuthError> {
        let settings: OAuth2Settings = serde_json::from_value(self.credential_file(entry)?)
            .map_err(|err| AuthError::CredentialFile(err.to_string()))?;
        let Some(token) = self.cached_token(profile, &settings) else {
            warn!(profile = %profile, "no valid cached oauth2 token; token refresh is not configured");
            return Ok(AuthHeaders::new());
        };

        let mut headers = AuthHeaders::new();
        let value = settings
            .token_format
            .header_value_template
            .replace("{access_token}", &token.access_token);
        headers.insert(settings.token_format.header_name.clone(), value);
        headers.extend(settings.additional_headers);
        Ok(headers)
    }

    fn apikey_headers(&self, entry: &AuthProfile) -> Result<AuthHeaders, AuthError> {
        let settings: ApiKeySettings = serde_json::from_value(self.credential_file(entry)?)
            .map_err(|err| AuthError::CredentialFile(err.to_string()))?;
        let api_key = settings
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AuthError::MissingField("api_key".to_string()))?;

        let mut headers = AuthHeaders::new();
        headers.insert(settings.key_name, format!("{}{}", settings.key_prefix, api_key));
        headers.extend(settings.additional_headers);
        Ok(headers)
    }

    /// 依次查内存缓存、缓存文件、刷新扩展。
    fn cached_token(&self, profile: &str, settings: &OAuth2Settings) -> Option<CachedToken> {
        let now = now_seconds();
        let threshold = settings.token_cache.refresh_threshold_seconds;

        let remembered = self
            .tokens
            .read()
            .ok()
            .and_then(|tokens| tokens.get(profile).cloned());
        if let Some(token) = remembered.filter(|token| token.is_valid_at(now, threshold)) {
            return Some(token);
        }

        let cache_path = settings
            .token_cache
            .cache_file
            .as_ref()
            .filter(|_| settings.token_cache.enabled)
            .map(|file| self.auth_dir.join(file));

        if let Some(path) = cache_path.as_ref().filter(|path| path.exists()) {
            match read_json::<CachedToken>(path) {
                Ok(token) if token.is_valid_at(now, threshold) => {
                    self.remember(profile, &token);
                    return Some(token);
                }
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to read cached token"),
            }
        }

        let refresher = self.refresher.as_ref()?;
        match refresher.refresh(profile, settings) {
            Ok(token) => {
                self.remember(profile, &token);
                if let Some(path) = cache_path {
                    persist_token(&path, &token);
                }
                Some(token)
            }
            Err(err) => {
                warn!(profile = %profile, error = %err, "oauth2 token refresh failed");
                None
            }
        }
    }

    fn remember(&self, profile: &str, token: &CachedToken) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(profile.to_string(), token.clone());
        }
    }

    fn try_connection_config(&self, profile: &str) -> Result<Map<String, Value>, AuthError> {
        let entry = self.entry(profile)?;
        match self.credential_file(entry)? {
            Value::Object(config) => Ok(config),
            _ => Err(AuthError::CredentialFile(
                "credential file is not a JSON object".to_string(),
            )),
        }
    }

    fn try_mtls_config(&self, profile: &str) -> Result<MtlsMaterial, AuthError> {
        let entry = self.entry(profile)?;
        ensure_type(profile, entry, "mtls")?;
        let config = self.try_connection_config(profile)?;

        let path_field = |name: &str| {
            config
                .get(name)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
                .map(PathBuf::from)
        };
        let cert_path = path_field("client_cert_path")
            .ok_or_else(|| AuthError::MissingField("client_cert_path".to_string()))?;
        let key_path = path_field("client_key_path")
            .ok_or_else(|| AuthError::MissingField("client_key_path".to_string()))?;
        let ca_path = path_field("ca_cert_path");

        let base = entry
            .config_file
            .as_deref()
            .and_then(|file| Path::new(file).parent())
            .map(|parent| self.auth_dir.join(parent))
            .unwrap_or_else(|| self.auth_dir.clone());
        let absolute = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };

        Ok(MtlsMaterial {
            cert_path: absolute(cert_path),
            key_path: absolute(key_path),
            ca_path: ca_path.map(absolute),
        })
    }

    fn try_sql_connection_string(&self, profile: &str) -> Result<String, AuthError> {
        let entry = self.entry(profile)?;
        ensure_type(profile, entry, "connection_string")?;
        self.try_connection_config(profile)?
            .get("connection_string")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AuthError::MissingField("connection_string".to_string()))
    }

    fn credential_file(&self, entry: &AuthProfile) -> Result<Value, AuthError> {
        let file = entry
            .config_file
            .as_deref()
            .ok_or_else(|| AuthError::MissingField("config_file".to_string()))?;
        let path = self.auth_dir.join(file);
        if !path.exists() {
            return Err(AuthError::CredentialFile(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let value = read_json::<Value>(&path)?;
        Ok(substitute_env_vars(value))
    }
}

fn ensure_type(profile: &str, entry: &AuthProfile, expected: &'static str) -> Result<(), AuthError> {
    match entry.profile_type.as_deref() {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(AuthError::WrongProfileType {
            profile: profile.to_string(),
            expected,
            actual: actual.unwrap_or("unspecified").to_string(),
        }),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AuthError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| AuthError::CredentialFile(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| AuthError::CredentialFile(format!("{}: {err}", path.display())))
}

fn persist_token(path: &Path, token: &CachedToken) {
    let result = serde_json::to_string_pretty(token)
        .map_err(|err| err.to_string())
        .and_then(|text| std::fs::write(path, text).map_err(|err| err.to_string()));
    if let Err(err) = result {
        warn!(path = %path.display(), error = %err, "failed to persist refreshed token");
    }
}
