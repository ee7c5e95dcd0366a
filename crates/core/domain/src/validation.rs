//! 绑定配置校验规则

use serde_json::{Map, Value};

use crate::binding::{Operation, Protocol};

pub const VALID_OPERATIONS: [&str; 5] = ["read", "stream", "write", "connect", "disconnect"];
pub const VALID_AUTH_METHODS: [&str; 4] = ["none", "oauth2", "apikey", "mtls"];

/// 按协议与操作列出缺失的必填字段。
pub fn required_field_errors(
    protocol: Protocol,
    operation: Operation,
    has_field: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut errors = Vec::new();
    let mut require = |field: &str, message: &str| {
        if !has_field(field) {
            errors.push(message.to_string());
        }
    };

    match protocol {
        Protocol::Mqtt => {
            require("uri", "MQTT binding requires 'uri' field");
            if operation == Operation::Stream {
                require("topic", "MQTT streaming requires 'topic' field");
            }
        }
        Protocol::Rest => {
            require("uri", "REST binding requires 'uri' field");
            require("method", "REST binding requires 'method' field");
        }
        Protocol::Sql => {
            require("uri", "SQL binding requires 'uri' field");
            require("query", "SQL binding requires 'query' field");
        }
        Protocol::Grpc => {
            require("uri", "gRPC binding requires 'uri' field");
            require("query", "gRPC binding requires 'query' field (request payload)");
        }
        Protocol::Websocket => {
            require("uri", "WebSocket binding requires 'uri' field");
        }
        Protocol::File => {
            require("uri", "File binding requires 'uri' field (file path)");
        }
    }
    errors
}

/// 校验未类型化的绑定字段表，返回全部问题（空表示通过）。
///
/// 只做提示，不拒绝；调用方自行决定告警还是拒绝注册。
pub fn validate_binding_fields(fields: &Map<String, Value>) -> Vec<String> {
    let present = |name: &str| match fields.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    };

    let Some(protocol) = fields.get("protocol").filter(|_| present("protocol")) else {
        return vec!["Missing required field: protocol".to_string()];
    };

    let operation_text = fields
        .get("operation")
        .and_then(Value::as_str)
        .unwrap_or("read");
    let mut errors = Vec::new();

    match protocol.as_str().and_then(|text| text.parse::<Protocol>().ok()) {
        Some(protocol) => {
            let operation = operation_text.parse::<Operation>().unwrap_or_default();
            errors.extend(required_field_errors(protocol, operation, present));
        }
        None => errors.push(format!("Unsupported protocol: {protocol}")),
    }

    if !VALID_OPERATIONS.contains(&operation_text) {
        errors.push(format!(
            "Invalid operation: {operation_text}. Must be one of {}",
            VALID_OPERATIONS.join(", ")
        ));
    }

    if let Some(auth_method) = fields.get("authMethod").and_then(Value::as_str) {
        if !VALID_AUTH_METHODS.contains(&auth_method) {
            errors.push(format!(
                "Invalid authMethod: {auth_method}. Must be one of {}",
                VALID_AUTH_METHODS.join(", ")
            ));
        }
    }

    errors
}
