//! Shared state handed to every handler through axum's `State<T>` extractor.

use crate::dedup::DedupCache;
use crate::ws::WebSocketManager;
use sea_orm::DatabaseConnection;

/// Database handle, room broker and duplicate-send guard, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    ws: WebSocketManager,
    dedup: DedupCache,
}

impl AppState {
    pub fn new(db: DatabaseConnection, ws: WebSocketManager, dedup: DedupCache) -> Self {
        Self { db, ws, dedup }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn ws(&self) -> &WebSocketManager {
        &self.ws
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }
}
