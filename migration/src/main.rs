use std::{env, fs, path::Path};

mod runner;
use migration::Migrator;
use sea_orm_migration::prelude::*;

/// Migration CLI. No argument applies all migrations; `clean` deletes the
/// database and stored uploads; `fresh` cleans and re-applies; `status` lists
/// applied vs pending.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let db_path = env::var("DATABASE_PATH").expect("DATABASE_PATH must be set");
    let url = format!("sqlite://{db_path}?mode=rwc");

    match env::args().nth(1).as_deref() {
        Some("clean") => clean(&db_path),
        Some("fresh") => {
            clean(&db_path);
            prepare_db_dir(&db_path);
            runner::run_all_migrations(&url).await;
        }
        Some("status") => {
            let db = sea_orm::Database::connect(&url)
                .await
                .expect("DB connection failed");
            Migrator::status(&db).await.expect("Failed to query status");
        }
        _ => {
            prepare_db_dir(&db_path);
            runner::run_all_migrations(&url).await;
        }
    }
}

/// Removes the database file and the attachment storage root.
fn clean(db_path: &str) {
    let db_file = Path::new(db_path);
    if db_file.exists() {
        fs::remove_file(db_file).expect("Failed to delete DB file");
        println!("Deleted {}", db_file.display());
    }

    if let Ok(upload_root) = env::var("UPLOAD_STORAGE_ROOT") {
        let uploads = Path::new(&upload_root);
        if uploads.exists() {
            fs::remove_dir_all(uploads).expect("Failed to delete stored uploads");
            println!("Deleted {}", uploads.display());
        }
    }
}

fn prepare_db_dir(db_path: &str) {
    if let Some(parent) = Path::new(db_path).parent() {
        fs::create_dir_all(parent).expect("Failed to create DB directory");
    }
}
