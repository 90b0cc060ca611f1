//! Typed broadcast helpers for ticket room events.
//!
//! Handlers never call `WebSocketManager::broadcast` directly; they go through
//! these functions so event names and target rooms stay in one place.

use util::ws::{self, WebSocketManager, staff_room, ticket_room};

use crate::ws::payload::{MessagePayload, StatusUpdatePayload};

/// New chat message, delivered to everyone watching the ticket.
pub async fn receive_message(ws: &WebSocketManager, message: &MessagePayload) {
    let room = ticket_room(message.ticket_id);
    ws::emit(ws, &room, "receive_message", message).await;
}

/// Status change, delivered to the ticket room and to the staff room so list
/// views can update without polling.
pub async fn ticket_status_update(ws: &WebSocketManager, payload: &StatusUpdatePayload) {
    let room = ticket_room(payload.ticket_id);
    ws::emit(ws, &room, "ticket_status_update", payload).await;
    ws::emit(ws, staff_room(), "ticket_status_update", payload).await;
}

/// Lightweight signal to the staff room that the ticket list changed
/// (creation, assignment, auto-progress). Carries no payload; clients refetch.
pub async fn tickets_reload(ws: &WebSocketManager) {
    ws::emit(ws, staff_room(), "tickets_reload", &serde_json::json!({})).await;
}
