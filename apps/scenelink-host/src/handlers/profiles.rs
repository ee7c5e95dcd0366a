//! 认证档案 handlers（只返回元信息，不返回凭据）

use crate::AppState;
use crate::utils::response::ok;
use api_contract::{ProfileDto, ProfileValidationDto};
use axum::{
    extract::{Path, State},
    response::Response,
};

pub async fn list_profiles(State(state): State<AppState>) -> Response {
    let items: Vec<ProfileDto> = state
        .auth
        .list_profiles()
        .into_iter()
        .map(|(name, profile)| ProfileDto {
            name,
            profile_type: profile.profile_type,
            description: profile.description,
        })
        .collect();
    ok(items)
}

/// 校验档案；校验失败也返回 200，结果在 `valid` 字段中。
pub async fn validate_profile(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let validation = state.auth.validate_profile(&name);
    ok(ProfileValidationDto {
        profile: name,
        valid: validation.valid,
        message: validation.message,
    })
}
