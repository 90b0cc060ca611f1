//! User administration and reporting endpoints.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use util::state::AppState;

use crate::auth::guards::{allow_admin, allow_staff};
use crate::response::ApiResponse;

pub mod get;
pub mod post;
pub mod put;

pub fn admin_routes() -> Router<AppState> {
    let admin_only = Router::new()
        .route("/moderators", get(get::list_moderators))
        .route("/users/{user_id}/role", put(put::set_role))
        .route_layer(from_fn(allow_admin));

    Router::new()
        .route("/users", post(post::create_user).get(get::list_users))
        .route("/users/{user_id}/info", put(put::update_info))
        .route("/report", get(get::closure_report))
        .merge(admin_only)
        .route_layer(from_fn(allow_staff))
}

pub(super) fn internal(e: impl std::fmt::Display) -> Response {
    tracing::error!(error = %e, "Admin endpoint failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Internal server error")),
    )
        .into_response()
}
