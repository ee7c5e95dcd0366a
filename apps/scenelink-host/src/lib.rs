//! 无界面宿主进程
//!
//! 把场景、认证档案与协议管理器装配在一起，并提供手动操作用的 HTTP 控制接口。
//! 路由见 [`routes`]，所有响应使用 `api_contract::ApiResponse` 封装，
//! 并带 `x-request-id` / `x-trace-id` 响应头。

pub mod bootstrap;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod shutdown;
pub mod utils;

use std::sync::Arc;

use axum::Router;
use scenelink_auth::AuthManager;
use scenelink_runtime::ProtocolManager;
use tower_http::trace::TraceLayer;

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub manager: ProtocolManager,
    pub auth: Arc<AuthManager>,
}

/// 组装完整的控制接口应用。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(axum::middleware::from_fn(middleware::request_context))
}
