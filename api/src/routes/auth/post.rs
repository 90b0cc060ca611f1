use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::user::{self, Role};
use serde::Deserialize;
use serde_json::json;
use util::state::AppState;
use validator::Validate;

use crate::auth::claims::AuthUser;
use crate::auth::generate_jwt;
use crate::response::ApiResponse;

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// POST /api/auth/register
///
/// Creates a requester account. Staff roles are only granted through the
/// admin endpoints.
pub async fn register(
    State(app_state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response();
    }

    let db = app_state.db();
    match user::Model::find_by_username(db, &req.username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error("Username already taken")),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => return internal(e),
    }

    match user::Model::create(
        db,
        &req.username,
        &req.password,
        Role::User,
        req.full_name.as_deref(),
        req.phone.as_deref(),
    )
    .await
    {
        Ok(created) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                json!({ "user": created }),
                "Account created",
            )),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
///
/// Verifies credentials and issues a JWT carrying the user's role.
pub async fn login(State(app_state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    let db = app_state.db();

    let found = match user::Model::find_by_username(db, &req.username).await {
        Ok(found) => found,
        Err(e) => return internal(e),
    };
    let Some(account) = found else {
        return invalid_credentials();
    };
    if !account.verify_password(&req.password) {
        return invalid_credentials();
    }

    let (token, expires_at) = match generate_jwt(account.id, account.role) {
        Ok(pair) => pair,
        Err(e) => return internal(e),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            json!({
                "token": token,
                "expires_at": expires_at,
                "user": account,
            }),
            "Logged in",
        )),
    )
        .into_response()
}

/// POST /api/auth/subscribe
///
/// Stores the caller's push subscription. The payload is opaque to us apart
/// from the `endpoint` the notifier posts to.
pub async fn subscribe(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(subscription): Json<serde_json::Value>,
) -> Response {
    if subscription.get("endpoint").and_then(|e| e.as_str()).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                "Subscription must contain an endpoint",
            )),
        )
            .into_response();
    }

    match user::Model::set_push_subscription(
        app_state.db(),
        claims.sub,
        &subscription.to_string(),
    )
    .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({}), "Subscription saved")),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error("Invalid username or password")),
    )
        .into_response()
}

fn internal(e: impl std::fmt::Display) -> Response {
    tracing::error!(error = %e, "Auth endpoint failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Internal server error")),
    )
        .into_response()
}
