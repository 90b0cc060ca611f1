pub mod message_attachments;
pub mod messages;
pub mod status_history;
pub mod tickets;
pub mod user;
