//! Ticket endpoints.
//!
//! Everything here requires authentication; the staff list and the admin
//! assignment additionally carry their own role guards. The service layer
//! re-checks roles, so the guards only decide the HTTP status shape.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post, put},
};
use util::state::AppState;

use crate::auth::guards::{allow_admin, allow_authenticated, allow_staff};

pub mod common;
pub mod get;
pub mod post;
pub mod put;

// Matches the upload cap enforced when files are streamed in.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn ticket_routes() -> Router<AppState> {
    let staff_only = Router::new()
        .route("/all", get(get::list_all_tickets))
        .route_layer(from_fn(allow_staff));

    let admin_only = Router::new()
        .route("/{ticket_id}/assign", put(put::assign_ticket))
        .route_layer(from_fn(allow_admin));

    Router::new()
        .route("/", post(post::create_ticket))
        .route("/my", get(get::list_my_tickets))
        .route(
            "/{ticket_id}/messages",
            get(get::list_messages).post(post::post_message),
        )
        .route("/{ticket_id}/status", put(put::change_status))
        .merge(staff_only)
        .merge(admin_only)
        .route_layer(from_fn(allow_authenticated))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
