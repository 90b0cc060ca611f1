pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use util::config;

/// Connects using `DATABASE_PATH`. A value that already looks like a DSN is
/// passed through; anything else is treated as a SQLite file path, creating
/// parent directories as needed since SQLite won't.
pub async fn connect() -> DatabaseConnection {
    let configured = config::database_path();
    let is_dsn = ["sqlite:", "postgres://", "mysql://"]
        .iter()
        .any(|prefix| configured.starts_with(prefix));

    let url = if is_dsn {
        configured
    } else {
        if let Some(parent) = Path::new(&configured).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        format!("sqlite://{configured}")
    };

    Database::connect(&url)
        .await
        .expect("Failed to connect to database")
}
