//! 流式绑定批量启停
//!
//! 单个绑定失败记录在报告中，不影响其他绑定，HTTP 状态始终为 200。

use crate::AppState;
use crate::utils::response::{ok, report_to_dto};
use axum::{extract::State, response::Response};

pub async fn start_streaming(State(state): State<AppState>) -> Response {
    let report = state.manager.start_streaming_connections().await;
    ok(report_to_dto(report))
}

pub async fn stop_streaming(State(state): State<AppState>) -> Response {
    let report = state.manager.stop_streaming_connections().await;
    ok(report_to_dto(report))
}
