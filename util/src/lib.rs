pub mod config;
pub mod dedup;
pub mod paths;
pub mod state;
pub mod ws;
