//! 稳定的 DTO 与 API 响应契约。
//!
//! 宿主控制接口的请求/响应结构，字段统一 camelCase。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 绑定定位：实体路径 + 属性名。
///
/// 同时用作 `GET /api/binding` 的查询参数与连接/断开/读取的请求体。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingTarget {
    #[serde(alias = "entity_path", alias = "entityPath")]
    pub entity: String,
    #[serde(alias = "attribute_name", alias = "attributeName")]
    pub attribute: String,
}

/// 写入请求体。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteBindingRequest {
    #[serde(alias = "entity_path", alias = "entityPath")]
    pub entity: String,
    #[serde(alias = "attribute_name", alias = "attributeName")]
    pub attribute: String,
    pub value: Value,
}

/// 绑定返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDto {
    pub entity_path: String,
    pub attribute_name: String,
    pub protocol: String,
    pub operation: String,
    pub uri: Option<String>,
    pub topic: Option<String>,
    pub auth_profile: Option<String>,
    pub state: String,
    pub streaming: bool,
    pub last_value: Option<Value>,
    pub last_error: Option<String>,
}

/// 单次读取结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResultDto {
    pub binding: String,
    pub value: Value,
}

/// 写入结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResultDto {
    pub binding: String,
    pub accepted: bool,
}

/// 批量操作中单个绑定的失败。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailureDto {
    pub binding: String,
    pub error: String,
}

/// 批量启动/停止结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReportDto {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailureDto>,
}

/// 认证档案返回结构（不含凭据）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub name: String,
    pub profile_type: Option<String>,
    pub description: Option<String>,
}

/// 档案校验结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileValidationDto {
    pub profile: String,
    pub valid: bool,
    pub message: String,
}

/// 绑定计数器快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
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
