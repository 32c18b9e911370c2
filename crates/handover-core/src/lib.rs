//! Business logic and repository trait definitions for Handover.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements. It depends only on `handover-types`,
//! never on `handover-infra` or any database/IO crate.

pub mod chat;
pub mod event;
pub mod language;
pub mod learning;
pub mod provider;
pub mod repository;
pub mod respond;
pub mod takeover;
pub mod visibility;
