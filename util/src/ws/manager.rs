//! Room broker for WebSocket fan-out.
//!
//! One tokio broadcast channel per room, created on first subscribe and torn
//! down once the last receiver is gone. A presence map counts how many sockets
//! each user currently holds in a room, so callers can skip push notifications
//! for someone who is already watching the chat.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

const ROOM_CAPACITY: usize = 100;

#[derive(Clone, Default)]
pub struct WebSocketManager {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    // room -> user -> open socket count (one user can hold several tabs)
    presence: Arc<RwLock<HashMap<String, HashMap<i64, usize>>>>,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver on `room`, creating the room on first use.
    pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<String> {
        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Sends `msg` to everyone in `room`. No-op for a room nobody created.
    /// A room left without receivers is dropped afterwards.
    pub async fn broadcast<T: Into<String>>(&self, room: &str, msg: T) {
        let mut rooms = self.rooms.write().await;
        let Some(sender) = rooms.get(room) else {
            return;
        };
        let _ = sender.send(msg.into());
        if sender.receiver_count() == 0 {
            tracing::debug!(room, "dropping empty room");
            rooms.remove(room);
        }
    }

    /// Whether a broadcast channel currently exists for `room`.
    pub async fn has_room(&self, room: &str) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    /// Counts a socket of `user_id` into `room`.
    pub async fn register(&self, room: &str, user_id: i64) {
        let mut presence = self.presence.write().await;
        *presence
            .entry(room.to_string())
            .or_default()
            .entry(user_id)
            .or_insert(0) += 1;
    }

    /// Counts a socket of `user_id` out of `room`, cleaning up empty entries.
    pub async fn unregister(&self, room: &str, user_id: i64) {
        let mut presence = self.presence.write().await;
        let Some(users) = presence.get_mut(room) else {
            return;
        };
        match users.get_mut(&user_id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                users.remove(&user_id);
            }
            None => {}
        }
        if users.is_empty() {
            presence.remove(room);
        }
    }

    /// True while `user_id` has at least one open socket in `room`.
    pub async fn is_user_present_in(&self, room: &str, user_id: i64) -> bool {
        self.presence
            .read()
            .await
            .get(room)
            .is_some_and(|users| users.contains_key(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn it_broadcasts_to_all_subscribers() {
        let manager = WebSocketManager::new();
        let room = "ticket:42";

        let mut r1 = manager.subscribe(room).await;
        let mut r2 = manager.subscribe(room).await;

        manager.broadcast(room, "hello world").await;

        let msg1 = timeout(Duration::from_millis(50), r1.recv())
            .await
            .unwrap()
            .unwrap();
        let msg2 = timeout(Duration::from_millis(50), r2.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(msg1, "hello world");
        assert_eq!(msg2, "hello world");
    }

    #[tokio::test]
    async fn it_creates_room_lazily() {
        let manager = WebSocketManager::new();
        assert!(!manager.has_room("staff").await);
        let _rx = manager.subscribe("staff").await;
        assert!(manager.has_room("staff").await);
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_does_not_panic() {
        let manager = WebSocketManager::new();
        manager.broadcast("no-subscribers", "silent").await;
    }

    #[tokio::test]
    async fn room_is_removed_after_broadcast_if_no_subscribers() {
        let manager = WebSocketManager::new();
        let room = "ticket:9";
        {
            let _rx = manager.subscribe(room).await;
        } // receiver dropped here
        manager.broadcast(room, "cleanup").await;
        assert!(!manager.has_room(room).await);
    }

    #[tokio::test]
    async fn presence_register_unregister_and_query() {
        let m = WebSocketManager::new();
        let room = "ticket:1";
        assert!(!m.is_user_present_in(room, 7).await);
        m.register(room, 7).await;
        assert!(m.is_user_present_in(room, 7).await);
        m.register(room, 7).await; // second tab
        m.unregister(room, 7).await;
        assert!(m.is_user_present_in(room, 7).await);
        m.unregister(room, 7).await;
        assert!(!m.is_user_present_in(room, 7).await);
    }

    #[tokio::test]
    async fn broadcasts_are_scoped_to_their_room() {
        let manager = WebSocketManager::new();
        let mut ticket_rx = manager.subscribe("ticket:1").await;
        let mut staff_rx = manager.subscribe("staff").await;

        manager.broadcast("staff", "reload").await;

        let staff_msg = timeout(Duration::from_millis(50), staff_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staff_msg, "reload");
        assert!(
            timeout(Duration::from_millis(50), ticket_rx.recv())
                .await
                .is_err()
        );
    }
}
