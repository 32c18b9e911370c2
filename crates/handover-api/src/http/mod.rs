//! HTTP and WebSocket API layer.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
