use api::routes::routes;
use api::{auth::middleware::log_request, ws::ws_routes};
use axum::{
    Router,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    middleware::from_fn,
};
use db::connect;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, services::ServeDir};
use util::{config, dedup::DedupCache, paths, state::AppState, ws::WebSocketManager};

#[tokio::main]
async fn main() {
    let _log_guard = init_logging();

    let upload_root = paths::upload_root();
    if let Err(e) = paths::ensure_dir(&upload_root) {
        eprintln!("Cannot create upload root {}: {e}", upload_root.display());
        std::process::exit(1);
    }

    let state = AppState::new(
        connect().await,
        WebSocketManager::new(),
        DedupCache::from_config(),
    );

    let app = Router::new()
        .nest("/api", routes(state.clone()))
        .nest("/ws", ws_routes(state))
        .nest_service("/uploads", ServeDir::new(upload_root))
        .layer(from_fn(log_request))
        .layer(CorsLayer::very_permissive().expose_headers([CONTENT_DISPOSITION, CONTENT_TYPE]));

    let addr: SocketAddr = format!("{}:{}", config::host(), config::port())
        .parse()
        .expect("Invalid HOST/PORT");
    println!("{} listening on http://{addr}", config::project_name());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server crashed");
}

/// Daily rolling file log under `logs/`, with an optional stdout layer. The
/// returned guard must stay alive for the writer thread to flush.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    std::fs::create_dir_all("logs").ok();
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily("logs", config::log_file()));

    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(config::log_level()));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config::log_to_stdout() {
        registry.with(fmt::layer().with_writer(std::io::stdout)).init();
    } else {
        registry.init();
    }

    guard
}
