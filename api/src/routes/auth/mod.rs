use axum::{Router, middleware::from_fn, routing::post};
use util::state::AppState;

use crate::auth::guards::allow_authenticated;

pub mod post;

pub fn auth_routes() -> Router<AppState> {
    let subscribed = Router::new()
        .route("/subscribe", post(post::subscribe))
        .route_layer(from_fn(allow_authenticated));

    Router::new()
        .route("/register", post(post::register))
        .route("/login", post(post::login))
        .merge(subscribed)
}
