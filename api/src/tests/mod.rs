use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use db::models::user::{self, Role};
use db::test_utils::setup_test_db;
use sea_orm::DatabaseConnection;
use util::dedup::DedupCache;
use util::state::AppState;
use util::ws::WebSocketManager;

use crate::services::notify::{Notifier, PushPayload};
use crate::services::tickets::ServiceContext;

mod ticket_service_test;
mod ws_dispatch_test;

/// Captures notifications instead of delivering them.
pub struct RecordingNotifier {
    pub user_notes: Mutex<Vec<(i64, PushPayload)>>,
    pub staff_notes: Mutex<Vec<PushPayload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            user_notes: Mutex::new(Vec::new()),
            staff_notes: Mutex::new(Vec::new()),
        }
    }

    pub fn user_note_count(&self) -> usize {
        self.user_notes.lock().unwrap().len()
    }

    pub fn staff_note_count(&self) -> usize {
        self.staff_notes.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_user(&self, _db: &DatabaseConnection, user_id: i64, payload: &PushPayload) {
        self.user_notes.lock().unwrap().push((user_id, payload.clone()));
    }

    async fn notify_staff(&self, _db: &DatabaseConnection, payload: &PushPayload) {
        self.staff_notes.lock().unwrap().push(payload.clone());
    }
}

pub struct TestWorld {
    pub state: AppState,
    pub requester: user::Model,
    pub moderator: user::Model,
    pub admin: user::Model,
}

impl TestWorld {
    pub fn db(&self) -> &DatabaseConnection {
        self.state.db()
    }

    pub fn ctx_for(&self, account: &user::Model) -> ServiceContext {
        ServiceContext::new(account.id, account.role)
    }
}

/// Fresh in-memory database with one account per role and a short dedup
/// window so expiry tests stay fast.
pub async fn setup_world() -> TestWorld {
    let db = setup_test_db().await;

    let requester = user::Model::create(&db, "alice", "password123", Role::User, None, None)
        .await
        .unwrap();
    let moderator = user::Model::create(&db, "mallory", "password123", Role::Moderator, None, None)
        .await
        .unwrap();
    let admin = user::Model::create(&db, "root", "password123", Role::Admin, None, None)
        .await
        .unwrap();

    let state = AppState::new(
        db,
        WebSocketManager::new(),
        DedupCache::new(Duration::from_millis(80)),
    );

    TestWorld {
        state,
        requester,
        moderator,
        admin,
    }
}
