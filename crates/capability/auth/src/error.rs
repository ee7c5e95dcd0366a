/// 认证档案解析错误。
///
/// 对外的头部/连接配置接口会把这些错误降级为空结果并记录日志。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("auth profile '{profile}' has type {actual}, expected {expected}")]
    WrongProfileType {
        profile: String,
        expected: &'static str,
        actual: String,
    },
    #[error("credential file error: {0}")]
    CredentialFile(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
}
