use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::model::{
    AddUserRequest, AddUserResponse, ReloadResponse, RemoveUserResponse, WhitelistListResponse,
};
use crate::{AppState, error::AppError, utils::success_to_api_response};

#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    let users = state.whitelist.users().await;
    success_to_api_response(WhitelistListResponse {
        enabled: state.whitelist.is_enabled(),
        count: users.len(),
        users,
    })
}

#[axum::debug_handler]
pub async fn add_user(
    State(state): State<AppState>,
    Json(req): Json<AddUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.user_id <= 0 {
        return Err(AppError::Validation("用户ID必须为正整数".to_string()));
    }

    let added = state.whitelist.add(req.user_id, req.display_name).await?;
    Ok(success_to_api_response(AddUserResponse {
        user_id: req.user_id,
        added,
    }))
}

#[axum::debug_handler]
pub async fn remove_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.whitelist.remove(user_id).await?;
    Ok(success_to_api_response(RemoveUserResponse { user_id, removed }))
}

#[axum::debug_handler]
pub async fn reload(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let count = state.whitelist.reload().await?;
    Ok(success_to_api_response(ReloadResponse { count }))
}
