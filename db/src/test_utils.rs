use migration::Migrator;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

/// Fresh in-memory SQLite database with the full schema applied. Each call
/// yields an isolated database, so tests never share state.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory SQLite connection failed");
    Migrator::up(&db, None).await.expect("schema setup failed");
    db
}
