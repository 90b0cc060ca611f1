pub mod dispatcher;
pub mod notify;
pub mod tickets;
