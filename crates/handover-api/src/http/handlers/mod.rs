//! HTTP and WebSocket request handlers.

pub mod admin;
pub mod chat;
pub mod conversation;
pub mod learning;
pub mod stats;
pub mod takeover;
pub mod ws;
