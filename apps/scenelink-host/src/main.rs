//! 宿主进程入口：装配场景、认证、协议管理器并启动控制接口。

use std::sync::Arc;

use scenelink_auth::AuthManager;
use scenelink_binding::BindingParser;
use scenelink_config::RuntimeConfig;
use scenelink_host::{AppState, bootstrap, build_app, shutdown};
use scenelink_protocol::{ClientSettings, DefaultClientFactory};
use scenelink_runtime::ProtocolManager;
use scenelink_scene::InMemoryScene;
use scenelink_telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = RuntimeConfig::from_env()?;
    init_tracing();

    let auth = Arc::new(AuthManager::load(&config.auth_dir));
    let scene = Arc::new(match &config.scene_file {
        Some(path) => InMemoryScene::load(path)?,
        None => {
            warn!("SCENELINK_SCENE_FILE not set, starting with an empty scene");
            InMemoryScene::new()
        }
    });

    let settings = ClientSettings {
        read_timeout: config.read_timeout,
        connect_timeout: config.connect_timeout,
        http_timeout: config.http_timeout,
        mqtt_keep_alive: config.mqtt_keep_alive,
    };
    let factory = Arc::new(DefaultClientFactory::new(auth.clone(), settings));
    let manager = ProtocolManager::new(factory, scene.clone());

    // 扫描场景并注册绑定；单个绑定被拒绝不影响其他绑定
    let parser = BindingParser::new(scene.clone());
    bootstrap::register_scene_bindings(&manager, parser.scan_scene()).await;

    if config.autostart_streaming {
        let report = manager.start_streaming_connections().await;
        for failure in &report.failed {
            warn!(binding = %failure.key, error = %failure.error, "stream failed to start");
        }
    }

    let app = build_app(AppState {
        manager: manager.clone(),
        auth,
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %config.http_addr, "control api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    shutdown::shutdown_manager(&manager).await;
    Ok(())
}
