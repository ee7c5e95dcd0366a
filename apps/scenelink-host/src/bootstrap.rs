//! 启动装配：把场景扫描出的绑定注册到协议管理器。

use domain::BindingConfig;
use futures::future::join_all;
use scenelink_runtime::ProtocolManager;
use tracing::{info, warn};

/// 并发注册全部绑定，返回注册成功的数量。
///
/// `read` 绑定在注册时就会连接并读取一次。单个绑定被拒绝只记录告警。
pub async fn register_scene_bindings(manager: &ProtocolManager, configs: Vec<BindingConfig>) -> usize {
    let total = configs.len();
    let results = join_all(configs.into_iter().map(|binding| async move {
        let key = binding.key();
        match manager.register_config(binding).await {
            Ok(()) => true,
            Err(err) => {
                warn!(binding = %key, error = %err, "binding not registered");
                false
            }
        }
    }))
    .await;
    let registered = results.into_iter().filter(|ok| *ok).count();
    info!(registered, total, "scene bindings registered");
    registered
}
