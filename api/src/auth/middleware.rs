use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts},
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::TypedHeader;
use headers::{Origin, UserAgent};
use std::net::SocketAddr;
use tracing::info;

use crate::auth::claims::AuthUser;

/// Request log line for every non-preflight request: method, path, client IP,
/// caller (when a valid token is present), origin and user agent.
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();

    let caller = match AuthUser::from_request_parts(&mut parts, &()).await {
        Ok(AuthUser(claims)) => claims.sub.to_string(),
        Err(_) => "anonymous".to_string(),
    };
    let origin = TypedHeader::<Origin>::from_request_parts(&mut parts, &())
        .await
        .map(|TypedHeader(o)| o.to_string())
        .unwrap_or_else(|_| "-".into());
    let user_agent = TypedHeader::<UserAgent>::from_request_parts(&mut parts, &())
        .await
        .map(|TypedHeader(ua)| ua.to_string())
        .unwrap_or_else(|_| "-".into());

    info!(
        method = %parts.method,
        path = %parts.uri.path(),
        ip = %addr.ip(),
        user = %caller,
        origin = %origin,
        user_agent = %user_agent,
        "request"
    );

    next.run(Request::from_parts(parts, body)).await
}
