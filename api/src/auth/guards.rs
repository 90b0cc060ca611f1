//! Route-layer guards. Each guard authenticates the request, stashes the
//! verified `AuthUser` in the request extensions for handlers, and optionally
//! enforces a role before letting the request through.

use axum::{
    Json,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use db::models::user::Role;

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;

#[derive(serde::Serialize, Default)]
pub struct Empty;

type Denial = (StatusCode, Json<ApiResponse<Empty>>);

fn denied(status: StatusCode, message: &str) -> Denial {
    (status, Json(ApiResponse::error(message)))
}

/// Runs token extraction, inserts the `AuthUser` for downstream handlers and
/// applies `check` to the caller's role.
async fn guard(
    req: Request<Body>,
    next: Next,
    check: fn(Role) -> bool,
    denial_message: &str,
) -> Result<Response, Denial> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| denied(StatusCode::UNAUTHORIZED, "Authentication required"))?;

    if !check(user.0.role) {
        return Err(denied(StatusCode::FORBIDDEN, denial_message));
    }

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Any authenticated user.
pub async fn allow_authenticated(req: Request<Body>, next: Next) -> Result<Response, Denial> {
    guard(req, next, |_| true, "").await
}

/// Moderators and admins.
pub async fn allow_staff(req: Request<Body>, next: Next) -> Result<Response, Denial> {
    guard(req, next, |r| r.is_staff(), "Staff access required").await
}

/// Admins only.
pub async fn allow_admin(req: Request<Body>, next: Next) -> Result<Response, Denial> {
    guard(req, next, |r| r == Role::Admin, "Admin access required").await
}
