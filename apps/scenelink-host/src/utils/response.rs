//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, runtime_error
//! - DTO 转换：binding_to_dto, report_to_dto

use api_contract::{ApiResponse, BatchFailureDto, BatchReportDto, BindingDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scenelink_protocol::ProtocolError;
use scenelink_runtime::{BatchReport, BindingSnapshot, RuntimeError};

/// 成功响应
pub fn ok<T: serde::Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 运行时错误映射为 HTTP 状态码与错误码
pub fn runtime_error(err: RuntimeError) -> Response {
    let (status, code) = match &err {
        RuntimeError::ConfigValidation(_) => (StatusCode::BAD_REQUEST, "BINDING.INVALID_CONFIG"),
        RuntimeError::UnsupportedProtocol(_) => (StatusCode::BAD_REQUEST, "BINDING.UNSUPPORTED"),
        RuntimeError::BindingNotFound(_) => (StatusCode::NOT_FOUND, "BINDING.NOT_FOUND"),
        RuntimeError::NotConnected(_) => (StatusCode::CONFLICT, "BINDING.NOT_CONNECTED"),
        RuntimeError::Protocol(ProtocolError::Timeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "PROTOCOL.TIMEOUT")
        }
        RuntimeError::Protocol(_) => (StatusCode::BAD_GATEWAY, "PROTOCOL.ERROR"),
        RuntimeError::TypeConversion(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "BINDING.TYPE_CONVERSION")
        }
    };
    (status, Json(ApiResponse::<()>::error(code, err.to_string()))).into_response()
}

/// BindingSnapshot 转 BindingDto
pub fn binding_to_dto(snapshot: BindingSnapshot) -> BindingDto {
    BindingDto {
        entity_path: snapshot.key.entity_path,
        attribute_name: snapshot.key.attribute_name,
        protocol: snapshot.config.protocol.to_string(),
        operation: snapshot.config.operation.to_string(),
        uri: snapshot.config.uri,
        topic: snapshot.config.topic,
        auth_profile: snapshot.config.auth_profile,
        state: snapshot.state.to_string(),
        streaming: snapshot.streaming,
        last_value: snapshot.last_value,
        last_error: snapshot.last_error,
    }
}

/// BatchReport 转 BatchReportDto
pub fn report_to_dto(report: BatchReport) -> BatchReportDto {
    BatchReportDto {
        succeeded: report.succeeded.iter().map(ToString::to_string).collect(),
        failed: report
            .failed
            .into_iter()
            .map(|failure| BatchFailureDto {
                binding: failure.key.to_string(),
                error: failure.error,
            })
            .collect(),
    }
}
