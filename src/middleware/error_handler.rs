use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};

// 错误响应体最多读取的字节数
const MAX_LOGGED_BODY: usize = 4096;

/// 管理接口错误日志：4xx 记 warn，5xx 连同响应体记 error
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() {
        tracing::warn!(%method, %path, %status, "admin request rejected");
        return response;
    }
    if !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => {
            tracing::error!(
                %method,
                %path,
                %status,
                body = %String::from_utf8_lossy(&bytes),
                "admin request failed"
            );
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(%method, %path, %status, "admin request failed, body unreadable: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}
