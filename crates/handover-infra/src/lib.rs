//! Infrastructure layer for Handover.
//!
//! Contains implementations of the repository and provider traits defined
//! in `handover-core`: SQLite storage with split read/write pools, the
//! HTTP text provider, and the configuration loader.

pub mod config;
pub mod provider;
pub mod sqlite;
