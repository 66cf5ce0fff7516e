use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::{
    AppState,
    middleware::{admin_auth, log_errors},
    routes,
};

// 白名单管理路由
pub fn whitelist_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/whitelist",
            get(routes::whitelist::list_users).post(routes::whitelist::add_user),
        )
        .route("/whitelist/reload", post(routes::whitelist::reload))
        .route("/whitelist/{user_id}", delete(routes::whitelist::remove_user))
}

// 创建管理接口主路由，全部需要管理令牌
pub fn create_admin_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(whitelist_routes())
        .route("/health", get(routes::health::health))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth,
        ));

    Router::new()
        .nest("/admin", protected)
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
