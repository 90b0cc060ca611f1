//! Best-effort push notification delivery.
//!
//! Subscriptions are opaque JSON blobs stored per user; all we rely on is an
//! `endpoint` field to POST the payload to. Delivery failures are logged and
//! never surface to the caller. A `404` or `410` from the endpoint means the
//! subscription is gone, so it gets dropped from the user row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use db::models::user;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use tracing::{debug, warn};
use util::config;

/// What a push notification says and where tapping it takes the user.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Delivery seam so tests can record notifications instead of sending them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify one user, if they hold a subscription.
    async fn notify_user(&self, db: &DatabaseConnection, user_id: i64, payload: &PushPayload);

    /// Notify every staff member that holds a subscription.
    async fn notify_staff(&self, db: &DatabaseConnection, payload: &PushPayload);
}

/// Production notifier: POSTs the payload to each subscription endpoint.
pub struct HttpPushNotifier {
    client: reqwest::Client,
}

impl HttpPushNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config::push_timeout_seconds()))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn push_to(&self, db: &DatabaseConnection, target: &user::Model, payload: &PushPayload) {
        let Some(raw) = target.push_subscription.as_deref() else {
            return;
        };

        let endpoint = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => v
                .get("endpoint")
                .and_then(|e| e.as_str())
                .map(str::to_owned),
            Err(e) => {
                warn!(user_id = target.id, error = %e, "Stored push subscription is not valid JSON");
                None
            }
        };
        let Some(endpoint) = endpoint else {
            return;
        };

        match self.client.post(&endpoint).json(payload).send().await {
            Ok(resp)
                if resp.status() == StatusCode::NOT_FOUND
                    || resp.status() == StatusCode::GONE =>
            {
                debug!(user_id = target.id, "Push subscription expired; clearing");
                if let Err(e) = user::Model::clear_push_subscription(db, target.id).await {
                    warn!(user_id = target.id, error = %e, "Failed to clear expired push subscription");
                }
            }
            Ok(resp) if !resp.status().is_success() => {
                warn!(user_id = target.id, status = %resp.status(), "Push endpoint rejected notification");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = target.id, error = %e, "Push delivery failed");
            }
        }
    }
}

impl Default for HttpPushNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for HttpPushNotifier {
    async fn notify_user(&self, db: &DatabaseConnection, user_id: i64, payload: &PushPayload) {
        match user::Entity::find_by_id(user_id).one(db).await {
            Ok(Some(target)) => self.push_to(db, &target, payload).await,
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "Failed to load notification target"),
        }
    }

    async fn notify_staff(&self, db: &DatabaseConnection, payload: &PushPayload) {
        let staff = match user::Model::staff_with_subscriptions(db).await {
            Ok(staff) => staff,
            Err(e) => {
                warn!(error = %e, "Failed to load staff subscriptions");
                return;
            }
        };
        for member in staff {
            self.push_to(db, &member, payload).await;
        }
    }
}

static NOTIFIER: Lazy<Arc<dyn Notifier>> = Lazy::new(|| Arc::new(HttpPushNotifier::new()));

/// The process-wide notifier, defaulting to HTTP push delivery.
pub fn notifier() -> Arc<dyn Notifier> {
    NOTIFIER.clone()
}
