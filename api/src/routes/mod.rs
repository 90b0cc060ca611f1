use axum::Router;
use util::state::AppState;

pub mod admin;
pub mod auth;
pub mod tickets;

/// Assembles the `/api` surface and supplies the shared state.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth::auth_routes())
        .nest("/tickets", tickets::ticket_routes())
        .nest("/admin", admin::admin_routes())
        .with_state(app_state)
}
