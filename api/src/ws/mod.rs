use axum::{Router, middleware::from_fn, routing::get};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;

pub mod emit;
pub mod handlers;
pub mod payload;

pub fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::ticket_ws_handler))
        .route_layer(from_fn(allow_authenticated))
        .with_state(app_state)
}
