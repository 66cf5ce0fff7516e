use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub whitelist_enabled: bool,
    pub whitelist_users: usize,
}

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(HealthResponse {
        status: "ok",
        whitelist_enabled: state.whitelist.is_enabled(),
        whitelist_users: state.whitelist.user_count().await,
    })
}
