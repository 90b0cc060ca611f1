//! Environment-backed application configuration.
//!
//! Loaded once from `.env` plus the process environment into a global
//! `AppConfig`, then read through the free accessor functions below. Required
//! variables panic at startup rather than surfacing later as broken requests.

use std::env;
use std::sync::{OnceLock, RwLock};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub upload_storage_root: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub dedup_window_seconds: u64,
    pub push_timeout_seconds: u64,
}

static CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    /// Reads the full configuration from the environment.
    ///
    /// Panics when `DATABASE_PATH`, `UPLOAD_STORAGE_ROOT` or `JWT_SECRET` is
    /// missing; everything else has a default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: var_or("APP_ENV", "development"),
            project_name: var_or("PROJECT_NAME", "helpdesk"),
            log_level: var_or("LOG_LEVEL", "api=info"),
            log_file: var_or("LOG_FILE", "api.log"),
            log_to_stdout: var_or("LOG_TO_STDOUT", "false") == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            upload_storage_root: env::var("UPLOAD_STORAGE_ROOT")
                .expect("UPLOAD_STORAGE_ROOT is required"),
            host: var_or("HOST", "127.0.0.1"),
            port: parsed_var_or("PORT", 3000),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: parsed_var_or("JWT_DURATION_MINUTES", 60),
            dedup_window_seconds: parsed_var_or("DEDUP_WINDOW_SECONDS", 12),
            push_timeout_seconds: parsed_var_or("PUSH_TIMEOUT_SECONDS", 5),
        }
    }

    /// Shared read access to the global configuration, initializing it on
    /// first use.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("AppConfig lock poisoned")
    }
}

// Field accessors, so call sites don't hold the read guard across awaits.

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn upload_storage_root() -> String {
    AppConfig::global().upload_storage_root.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn dedup_window_seconds() -> u64 {
    AppConfig::global().dedup_window_seconds
}

pub fn push_timeout_seconds() -> u64 {
    AppConfig::global().push_timeout_seconds
}
