//! Wire payloads for ticket room events. These are what clients receive inside
//! the standard event envelope, and also what push notifications link back to.

use db::models::{message_attachments, messages, tickets::TicketStatus, user};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentPayload {
    pub id: i64,
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl From<message_attachments::Model> for AttachmentPayload {
    fn from(m: message_attachments::Model) -> Self {
        Self {
            id: m.id,
            url: m.url,
            mime_type: m.mime_type,
            size_bytes: m.size_bytes,
        }
    }
}

/// A chat message as broadcast to the ticket room and returned from the
/// message endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    pub id: i64,
    pub ticket_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_role: user::Role,
    pub body: String,
    pub attachments: Vec<AttachmentPayload>,
    pub created_at: String,
}

impl MessagePayload {
    pub fn from_parts(
        message: messages::Model,
        sender: &user::Model,
        attachments: Vec<message_attachments::Model>,
    ) -> Self {
        Self {
            id: message.id,
            ticket_id: message.ticket_id,
            sender_id: sender.id,
            sender_username: sender.username.clone(),
            sender_role: sender.role,
            body: message.body,
            attachments: attachments.into_iter().map(Into::into).collect(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Broadcast whenever a ticket's status changes.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdatePayload {
    pub ticket_id: i64,
    pub status: TicketStatus,
    /// Present only when the change closed the ticket, e.g. `"2d 4h 13m"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<String>,
}
