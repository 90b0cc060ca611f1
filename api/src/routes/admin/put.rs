use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::user::{self, Role};
use sea_orm::DbErr;
use serde::Deserialize;
use serde_json::json;
use util::state::AppState;

use super::internal;
use crate::response::ApiResponse;

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// PUT /api/admin/users/{user_id}/role
///
/// Admin-only; the only path through which a role ever changes.
pub async fn set_role(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<SetRoleRequest>,
) -> Response {
    match user::Model::set_role(app_state.db(), user_id, req.role).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "user": updated }),
                "Role updated",
            )),
        )
            .into_response(),
        Err(DbErr::RecordNotFound(_)) => user_not_found(user_id),
        Err(e) => internal(e),
    }
}

#[derive(Deserialize)]
pub struct UpdateInfoRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// PUT /api/admin/users/{user_id}/info
pub async fn update_info(
    State(app_state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateInfoRequest>,
) -> Response {
    match user::Model::update_contact_info(
        app_state.db(),
        user_id,
        req.full_name.as_deref(),
        req.phone.as_deref(),
    )
    .await
    {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "user": updated }),
                "Contact info updated",
            )),
        )
            .into_response(),
        Err(DbErr::RecordNotFound(_)) => user_not_found(user_id),
        Err(e) => internal(e),
    }
}

fn user_not_found(user_id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(format!("User {user_id} not found"))),
    )
        .into_response()
}
