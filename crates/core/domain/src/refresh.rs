//! 刷新策略解析
//!
//! 语法：`interval:<数值>[s|m|h]`，无单位按秒计；其他写法回退到协议默认值。

use std::time::Duration;

use crate::binding::BindingConfig;

/// 解析刷新策略为秒数；无法识别时返回 `default_seconds`。
pub fn parse_refresh_interval(policy: Option<&str>, default_seconds: f64) -> f64 {
    let Some(amount) = policy.and_then(|policy| policy.trim().strip_prefix("interval:")) else {
        return default_seconds;
    };
    let amount = amount.trim();
    let (number, multiplier) = match amount.chars().last() {
        Some('s') => (&amount[..amount.len() - 1], 1.0),
        Some('m') => (&amount[..amount.len() - 1], 60.0),
        Some('h') => (&amount[..amount.len() - 1], 3600.0),
        _ => (amount, 1.0),
    };
    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value * multiplier,
        _ => default_seconds,
    }
}

/// 绑定的轮询间隔；缺省使用协议默认值。
///
/// 超出 `Duration` 表示范围的间隔同样回退到协议默认值。
pub fn refresh_interval(config: &BindingConfig, default_seconds: f64) -> Duration {
    let seconds = parse_refresh_interval(config.refresh_policy.as_deref(), default_seconds);
    Duration::try_from_secs_f64(seconds)
        .or_else(|_| Duration::try_from_secs_f64(default_seconds))
        .unwrap_or(Duration::from_secs(1))
}
