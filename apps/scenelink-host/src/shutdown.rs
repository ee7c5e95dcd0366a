//! 优雅关闭：等待信号，服务停止后断开全部绑定。

use std::time::Duration;

use scenelink_runtime::ProtocolManager;
use tracing::{error, info, warn};

/// 断开绑定的总时限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 等待 Ctrl+C 或 SIGTERM。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// 关闭协议管理器；超时只告警。
pub async fn shutdown_manager(manager: &ProtocolManager) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, manager.shutdown()).await {
        Ok(()) => info!("all bindings disconnected"),
        Err(_) => warn!(timeout = ?SHUTDOWN_TIMEOUT, "binding shutdown timed out"),
    }
}
