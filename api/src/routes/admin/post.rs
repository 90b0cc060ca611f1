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

use super::internal;
use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// POST /api/admin/users
///
/// Staff create accounts on behalf of others, e.g. a moderator onboarding a
/// requester. Only admins may mint further staff accounts.
pub async fn create_user(
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response();
    }

    if req.role != Role::User && claims.role != Role::Admin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                "Only admins may create staff accounts",
            )),
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
        req.role,
        req.full_name.as_deref(),
        req.phone.as_deref(),
    )
    .await
    {
        Ok(created) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                json!({ "user": created }),
                "User created",
            )),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}
