//! 路由定义
//!
//! - 健康检查：/health
//! - 绑定：/api/bindings, /api/binding, /api/bindings/{connect,disconnect,read,write}
//! - 流式：/api/streaming/{start,stop}
//! - 认证档案：/api/profiles, /api/profiles/:name/validate
//! - 计数器：/api/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建控制接口路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/bindings", get(list_bindings))
        .route("/api/binding", get(get_binding))
        .route("/api/bindings/connect", post(connect_binding))
        .route("/api/bindings/disconnect", post(disconnect_binding))
        .route("/api/bindings/read", post(read_binding))
        .route("/api/bindings/write", post(write_binding))
        .route("/api/streaming/start", post(start_streaming))
        .route("/api/streaming/stop", post(stop_streaming))
        .route("/api/profiles", get(list_profiles))
        .route("/api/profiles/:name/validate", get(validate_profile))
        .route("/api/metrics", get(get_metrics))
}
