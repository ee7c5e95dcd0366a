//! 绑定 handlers
//!
//! - GET /api/bindings - 列出全部绑定
//! - GET /api/binding?entity=&attribute= - 单个绑定详情
//! - POST /api/bindings/connect - 连接
//! - POST /api/bindings/disconnect - 断开（共享客户端在仍被引用时保持连接）
//! - POST /api/bindings/read - 读取一次并写回属性
//! - POST /api/bindings/write - 写入值（未连接时先连接）

use crate::AppState;
use crate::utils::response::{binding_to_dto, not_found_error, ok, runtime_error};
use api_contract::{BindingDto, BindingTarget, ReadResultDto, WriteBindingRequest, WriteResultDto};
use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};
use domain::BindingKey;
use tracing::info;

fn key_of(target: &BindingTarget) -> BindingKey {
    BindingKey::new(&target.entity, &target.attribute)
}

pub async fn list_bindings(State(state): State<AppState>) -> Response {
    let items: Vec<BindingDto> = state
        .manager
        .bindings()
        .into_iter()
        .map(binding_to_dto)
        .collect();
    ok(items)
}

pub async fn get_binding(
    State(state): State<AppState>,
    Query(target): Query<BindingTarget>,
) -> Response {
    let key = key_of(&target);
    match state.manager.binding(&key) {
        Some(snapshot) => ok(binding_to_dto(snapshot)),
        None => not_found_error(format!("binding not found: {key}")),
    }
}

pub async fn connect_binding(
    State(state): State<AppState>,
    Json(target): Json<BindingTarget>,
) -> Response {
    let key = key_of(&target);
    info!(binding = %key, "manual connect requested");
    match state.manager.connect_binding(&key).await {
        Ok(()) => snapshot_response(&state, &key),
        Err(err) => runtime_error(err),
    }
}

pub async fn disconnect_binding(
    State(state): State<AppState>,
    Json(target): Json<BindingTarget>,
) -> Response {
    let key = key_of(&target);
    info!(binding = %key, "manual disconnect requested");
    match state.manager.disconnect_binding(&key).await {
        Ok(()) => snapshot_response(&state, &key),
        Err(err) => runtime_error(err),
    }
}

/// 读取一次
///
/// 绑定未连接时返回 `409 BINDING.NOT_CONNECTED`，不会隐式连接。
pub async fn read_binding(
    State(state): State<AppState>,
    Json(target): Json<BindingTarget>,
) -> Response {
    let key = key_of(&target);
    match state.manager.refresh_binding(&key).await {
        Ok(value) => ok(ReadResultDto {
            binding: key.to_string(),
            value,
        }),
        Err(err) => runtime_error(err),
    }
}

pub async fn write_binding(
    State(state): State<AppState>,
    Json(req): Json<WriteBindingRequest>,
) -> Response {
    let key = BindingKey::new(&req.entity, &req.attribute);
    info!(binding = %key, "manual write requested");
    match state.manager.write_binding(&key, &req.value).await {
        Ok(accepted) => ok(WriteResultDto {
            binding: key.to_string(),
            accepted,
        }),
        Err(err) => runtime_error(err),
    }
}

fn snapshot_response(state: &AppState, key: &BindingKey) -> Response {
    match state.manager.binding(key) {
        Some(snapshot) => ok(binding_to_dto(snapshot)),
        None => not_found_error(format!("binding not found: {key}")),
    }
}
