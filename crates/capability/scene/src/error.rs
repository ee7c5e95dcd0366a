//! 场景协作者错误类型
//!
//! 场景图读取与属性写回失败时统一返回该错误：
//! - 实体或属性不存在
//! - 锁中毒
//! - 场景文档解析失败

#[derive(Debug)]
pub struct SceneError {
    message: String,
}

impl SceneError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SceneError {}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for SceneError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}
