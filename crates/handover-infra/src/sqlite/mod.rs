//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. The writer pool has exactly one
//! connection, so conditional ownership updates are serialized by
//! construction.

pub mod admin_session;
pub mod conversation;
pub mod learning;
pub mod message;
pub mod pool;
pub mod reply_cache;
