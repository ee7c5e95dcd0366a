//! REST 客户端实现
//!
//! 连接时建立一个持久 HTTP 会话，认证头作为默认头附加在会话上。
//! 流式读取通过按 `refreshPolicy` 间隔轮询实现（默认 30 秒）。

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{refresh_interval, AuthMethod, BindingConfig, Protocol};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use scenelink_auth::AuthManager;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{
    require, shape_payload, stream_key, ClientSettings, ProtocolClient, StreamHandler,
};
use crate::error::ProtocolError;
use crate::stream::{spawn_poller, StreamTasks};

/// REST 协议客户端
pub struct RestClient {
    auth: Arc<AuthManager>,
    settings: ClientSettings,
    session: RwLock<Option<reqwest::Client>>,
    streams: StreamTasks,
}

impl RestClient {
    pub fn new(auth: Arc<AuthManager>, settings: ClientSettings) -> Self {
        Self {
            auth,
            settings,
            session: RwLock::new(None),
            streams: StreamTasks::new(),
        }
    }

    fn http(&self) -> Result<reqwest::Client, ProtocolError> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProtocolError::NotConnected("rest"))
    }

    fn default_headers(&self, config: &BindingConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(profile) = config.auth_profile.as_deref() else {
            return headers;
        };
        if config.auth_method == AuthMethod::Mtls {
            return headers;
        }
        let method = (config.auth_method != AuthMethod::None).then_some(config.auth_method);
        for (name, value) in self.auth.get_auth_headers(profile, method) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(profile = %profile, header = %name, "invalid auth header skipped"),
            }
        }
        headers
    }

    async fn apply_identity(
        &self,
        builder: reqwest::ClientBuilder,
        profile: &str,
    ) -> Result<reqwest::ClientBuilder, ProtocolError> {
        let Some(material) = self.auth.get_mtls_config(profile) else {
            warn!(profile = %profile, "mtls requested but profile has no certificate material");
            return Ok(builder);
        };
        let mut pem = tokio::fs::read(&material.cert_path).await?;
        pem.push(b'\n');
        pem.extend(tokio::fs::read(&material.key_path).await?);
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| ProtocolError::Config(format!("invalid client identity: {e}")))?;
        let mut builder = builder.identity(identity);
        if let Some(ca_path) = material.ca_path {
            let ca = tokio::fs::read(&ca_path).await?;
            let certificate = reqwest::Certificate::from_pem(&ca)
                .map_err(|e| ProtocolError::Config(format!("invalid ca certificate: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        Ok(builder)
    }
}

/// 执行一次请求并解析响应体。
async fn fetch(http: &reqwest::Client, config: &BindingConfig) -> Result<Value, ProtocolError> {
    let uri = require(&config.uri, "REST", "uri")?;
    let method = parse_method(config.method.as_deref().unwrap_or("GET"))?;

    let response = http
        .request(method, uri)
        .send()
        .await
        .map_err(request_error)?;
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(ProtocolError::Request(format!("HTTP {status} from {uri}")));
    }
    let body = response.text().await.map_err(request_error)?;
    let data = serde_json::from_str(&body).unwrap_or(Value::String(body));
    Ok(shape_payload(config, data))
}

fn parse_method(method: &str) -> Result<Method, ProtocolError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ProtocolError::Config(format!("invalid http method: {method}")))
}

fn request_error(err: reqwest::Error) -> ProtocolError {
    if err.is_timeout() {
        ProtocolError::Timeout(err.to_string())
    } else if err.is_connect() {
        ProtocolError::Connection(err.to_string())
    } else {
        ProtocolError::Request(err.to_string())
    }
}

#[async_trait]
impl ProtocolClient for RestClient {
    fn protocol(&self) -> Protocol {
        Protocol::Rest
    }

    fn is_connected(&self) -> bool {
        self.session
            .read()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let mut builder = reqwest::Client::builder()
            .default_headers(self.default_headers(config))
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.http_timeout);
        if config.auth_method == AuthMethod::Mtls {
            if let Some(profile) = config.auth_profile.as_deref() {
                builder = self.apply_identity(builder, profile).await?;
            }
        }
        let http = builder
            .build()
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(http);
        info!(uri = config.uri.as_deref().unwrap_or_default(), "rest session ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let http = self.http()?;
        fetch(&http, config).await
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let http = self.http()?;
        let uri = require(&config.uri, "REST", "uri")?;
        let method = parse_method(config.method.as_deref().unwrap_or("POST"))?;
        if ![Method::POST, Method::PUT, Method::PATCH].contains(&method) {
            return Err(ProtocolError::Config(format!(
                "REST write requires POST, PUT or PATCH, got {method}"
            )));
        }

        let request = http.request(method, uri);
        let request = match value {
            Value::Object(_) | Value::Array(_) => request.json(value),
            Value::String(text) => request
                .header(CONTENT_TYPE, "text/plain")
                .body(text.clone()),
            other => request
                .header(CONTENT_TYPE, "text/plain")
                .body(other.to_string()),
        };
        let response = request.send().await.map_err(request_error)?;
        Ok(response.status().as_u16() < 400)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let http = self.http()?;
        let every = refresh_interval(config, Protocol::Rest.default_poll_seconds().unwrap_or(30.0));
        let key = stream_key(config);
        let config = config.clone();
        let handle = spawn_poller(
            key.clone(),
            every,
            move || {
                let http = http.clone();
                let config = config.clone();
                async move { fetch(&http, &config).await }
            },
            handler.on_value,
        );
        self.streams.insert(key, handle);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.streams.stop(&stream_key(config));
        Ok(())
    }
}
