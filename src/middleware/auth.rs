use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, error::AppError};

/// 管理接口鉴权：Authorization: Bearer <ADMIN_TOKEN>
pub async fn admin_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.config.admin_token.as_deref();

    match (bearer, expected) {
        (Some(TypedHeader(auth)), Some(expected)) if auth.token() == expected => {
            Ok(next.run(req).await)
        }
        _ => {
            tracing::warn!("Rejected admin request to {}", req.uri().path());
            Err(AppError::Unauthorized)
        }
    }
}
