//! 绑定配置与绑定标识

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::required_field_errors;

/// 绑定配置错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingConfigError {
    #[error("missing required field: protocol")]
    MissingProtocol,
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid authMethod: {0}")]
    InvalidAuthMethod(String),
    #[error("invalid field {0}: {1}")]
    InvalidField(String, String),
}

/// 支持的协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Mqtt,
    Rest,
    Sql,
    Grpc,
    Websocket,
    File,
}

impl Protocol {
    pub const ALL: [Protocol; 6] = [
        Protocol::Mqtt,
        Protocol::Rest,
        Protocol::Sql,
        Protocol::Grpc,
        Protocol::Websocket,
        Protocol::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Mqtt => "mqtt",
            Protocol::Rest => "rest",
            Protocol::Sql => "sql",
            Protocol::Grpc => "grpc",
            Protocol::Websocket => "websocket",
            Protocol::File => "file",
        }
    }

    /// 流式读取的默认轮询间隔（秒）；MQTT/WebSocket 为推送式，无轮询。
    pub fn default_poll_seconds(&self) -> Option<f64> {
        match self {
            Protocol::Rest | Protocol::Grpc => Some(30.0),
            Protocol::Sql => Some(60.0),
            Protocol::File => Some(5.0),
            Protocol::Mqtt | Protocol::Websocket => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = BindingConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .into_iter()
            .find(|protocol| protocol.as_str() == value)
            .ok_or_else(|| BindingConfigError::UnsupportedProtocol(value.to_string()))
    }
}

/// 绑定操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Read,
    Stream,
    Write,
    Connect,
    Disconnect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Stream => "stream",
            Operation::Write => "write",
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BindingConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Operation::Read),
            "stream" => Ok(Operation::Stream),
            "write" => Ok(Operation::Write),
            "connect" => Ok(Operation::Connect),
            "disconnect" => Ok(Operation::Disconnect),
            other => Err(BindingConfigError::InvalidOperation(other.to_string())),
        }
    }
}

/// 认证方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthMethod {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "apikey")]
    ApiKey,
    #[serde(rename = "mtls")]
    Mtls,
    #[serde(rename = "connection_string")]
    ConnectionString,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::OAuth2 => "oauth2",
            AuthMethod::ApiKey => "apikey",
            AuthMethod::Mtls => "mtls",
            AuthMethod::ConnectionString => "connection_string",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = BindingConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(AuthMethod::None),
            "oauth2" => Ok(AuthMethod::OAuth2),
            "apikey" => Ok(AuthMethod::ApiKey),
            "mtls" => Ok(AuthMethod::Mtls),
            "connection_string" => Ok(AuthMethod::ConnectionString),
            other => Err(BindingConfigError::InvalidAuthMethod(other.to_string())),
        }
    }
}

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(text)
    }
}

/// 绑定标识：实体路径 + 属性名，在注册表内唯一。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingKey {
    pub entity_path: String,
    pub attribute_name: String,
}

impl BindingKey {
    pub fn new(entity_path: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Self {
            entity_path: entity_path.into(),
            attribute_name: attribute_name.into(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_path, self.attribute_name)
    }
}

/// 经解析与校验后的绑定配置。
///
/// 元数据字段名沿用 `binding:<field>` 命名空间下的写法
/// （`jsonPath`、`authMethod`、`authProfile`、`refreshPolicy`），
/// 未识别的字段原样保存在 `extra` 中。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingConfig {
    pub protocol: Protocol,
    pub operation: Operation,
    pub uri: Option<String>,
    pub topic: Option<String>,
    pub query: Option<String>,
    pub method: Option<String>,
    pub json_path: Option<String>,
    pub auth_method: AuthMethod,
    pub auth_profile: Option<String>,
    pub refresh_policy: Option<String>,
    pub extra: Map<String, Value>,
    pub entity_path: String,
    pub attribute_name: String,
    pub attribute_type: Option<String>,
}

const KNOWN_FIELDS: [&str; 10] = [
    "protocol",
    "operation",
    "uri",
    "topic",
    "query",
    "method",
    "jsonPath",
    "authMethod",
    "authProfile",
    "refreshPolicy",
];

impl BindingConfig {
    /// 以最小字段构造配置（其余字段取默认值）。
    pub fn new(
        protocol: Protocol,
        entity_path: impl Into<String>,
        attribute_name: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            operation: Operation::Read,
            uri: None,
            topic: None,
            query: None,
            method: None,
            json_path: None,
            auth_method: AuthMethod::None,
            auth_profile: None,
            refresh_policy: None,
            extra: Map::new(),
            entity_path: entity_path.into(),
            attribute_name: attribute_name.into(),
            attribute_type: None,
        }
    }

    /// 从去掉命名空间后的字段表构造类型化配置。
    pub fn from_fields(
        fields: &Map<String, Value>,
        entity_path: impl Into<String>,
        attribute_name: impl Into<String>,
        attribute_type: Option<String>,
    ) -> Result<Self, BindingConfigError> {
        let protocol = text_field(fields, "protocol")
            .ok_or(BindingConfigError::MissingProtocol)?
            .parse::<Protocol>()?;
        let operation = match text_field(fields, "operation") {
            Some(value) => value.parse::<Operation>()?,
            None => Operation::Read,
        };
        let auth_method = match text_field(fields, "authMethod") {
            Some(value) => value.parse::<AuthMethod>()?,
            None => AuthMethod::None,
        };
        let extra = fields
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            protocol,
            operation,
            uri: text_field(fields, "uri"),
            topic: text_field(fields, "topic"),
            query: text_field(fields, "query"),
            method: text_field(fields, "method"),
            json_path: text_field(fields, "jsonPath"),
            auth_method,
            auth_profile: text_field(fields, "authProfile"),
            refresh_policy: text_field(fields, "refreshPolicy"),
            extra,
            entity_path: entity_path.into(),
            attribute_name: attribute_name.into(),
            attribute_type,
        })
    }

    /// 还原为元数据字段表（不含来源字段）。
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.extra.clone();
        fields.insert("protocol".into(), Value::from(self.protocol.as_str()));
        fields.insert("operation".into(), Value::from(self.operation.as_str()));
        fields.insert("authMethod".into(), Value::from(self.auth_method.as_str()));
        let optional = [
            ("uri", &self.uri),
            ("topic", &self.topic),
            ("query", &self.query),
            ("method", &self.method),
            ("jsonPath", &self.json_path),
            ("authProfile", &self.auth_profile),
            ("refreshPolicy", &self.refresh_policy),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                fields.insert(name.into(), Value::from(value.as_str()));
            }
        }
        fields
    }

    pub fn key(&self) -> BindingKey {
        BindingKey::new(&self.entity_path, &self.attribute_name)
    }

    /// 连接池键：`protocol://uri#authProfile`。
    pub fn pool_key(&self) -> String {
        format!(
            "{}://{}#{}",
            self.protocol,
            self.uri.as_deref().unwrap_or(""),
            self.auth_profile.as_deref().unwrap_or("")
        )
    }

    /// 按协议与操作检查必填字段，返回全部缺失项。
    pub fn validation_errors(&self) -> Vec<String> {
        required_field_errors(self.protocol, self.operation, |name| match name {
            "uri" => self.uri.is_some(),
            "topic" => self.topic.is_some(),
            "query" => self.query.is_some(),
            "method" => self.method.is_some(),
            _ => self.extra.contains_key(name),
        })
    }
}

/// 读取字符串字段；非字符串标量转为文本，空串与 null 视为缺失。
fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
