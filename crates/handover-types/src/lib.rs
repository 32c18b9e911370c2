//! Shared domain types for Handover.
//!
//! This crate contains the core domain types used across the Handover
//! support-chat service: Conversation, Message, AdminSession, LearningRecord,
//! cached replies, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod admin;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod learning;
pub mod message;
pub mod provider;
