pub mod m202608300001_create_users;
pub mod m202608300002_create_tickets;
pub mod m202608300003_create_messages;
pub mod m202608300004_create_message_attachments;
pub mod m202608300005_create_status_history;
