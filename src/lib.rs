pub mod chat;
pub mod config;
pub mod types;
pub mod workflow;
