pub mod manager;
pub use manager::WebSocketManager;

use chrono::Utc;
use serde::Serialize;

/// Room carrying one ticket's chat and status events.
pub fn ticket_room(ticket_id: i64) -> String {
    format!("ticket:{ticket_id}")
}

/// Room every staff socket joins on connect, for list-level signals.
pub fn staff_room() -> &'static str {
    "staff"
}

/// Envelope wrapped around every broadcast event.
#[derive(Serialize)]
pub struct EventEnvelope<'a, T> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub event: &'a str,
    pub room: &'a str,
    pub payload: T,
    pub ts: String,
}

/// Serializes `payload` into the standard envelope and broadcasts it.
pub async fn emit<T: Serialize>(ws: &WebSocketManager, room: &str, event: &str, payload: &T) {
    let envelope = EventEnvelope {
        kind: "event",
        event,
        room,
        payload,
        ts: Utc::now().to_rfc3339(),
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => ws.broadcast(room, json).await,
        Err(e) => tracing::warn!(room, event, error = %e, "dropping unserializable event"),
    }
}
