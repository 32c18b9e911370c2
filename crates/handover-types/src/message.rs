//! Message domain types for Handover.
//!
//! Messages are append-only and ordered by `created_at` within a
//! conversation. A correction never overwrites an AI message: it annotates
//! the original and appends a new message carrying the corrected text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::conversation::Language;
use crate::provider::ReplySource;

/// What kind of message this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A customer message.
    User,
    /// An automated reply.
    Ai,
    /// A reply typed by an admin, shown as admin to the customer.
    Admin,
    /// An admin-only note on the conversation.
    Internal,
    /// Generated by the service itself (takeover released, escalation...).
    System,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::User => write!(f, "user"),
            MessageKind::Ai => write!(f, "ai"),
            MessageKind::Admin => write!(f, "admin"),
            MessageKind::Internal => write!(f, "internal"),
            MessageKind::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageKind::User),
            "ai" => Ok(MessageKind::Ai),
            "admin" => Ok(MessageKind::Admin),
            "internal" => Ok(MessageKind::Internal),
            "system" => Ok(MessageKind::System),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

/// Visibility classification controlling which viewer roles may see a
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible to everyone (customer sees a redacted projection).
    Public,
    /// Admins and super admins only.
    AdminOnly,
    /// Admins and super admins only; never the customer.
    Internal,
    /// Super admins only.
    SuperAdminOnly,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::AdminOnly => write!(f, "admin_only"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::SuperAdminOnly => write!(f, "super_admin_only"),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "admin_only" => Ok(Visibility::AdminOnly),
            "internal" => Ok(Visibility::Internal),
            "super_admin_only" => Ok(Visibility::SuperAdminOnly),
            other => Err(format!("invalid visibility: '{other}'")),
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

/// Role of the viewer or sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
    System,
}

impl Role {
    /// Whether this role has admin-level access.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
            Role::System => write!(f, "system"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            "system" => Ok(Role::System),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// A single message within a conversation.
///
/// The true sender and role are always persisted; "appears as AI" is a
/// presentation-layer transform applied at projection time, never a storage
/// type of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub visibility: Visibility,
    /// Suppresses the message from the customer regardless of `visibility`.
    pub is_internal: bool,
    pub sender_role: Role,
    pub sender_id: Option<Uuid>,
    pub sender_name: Option<String>,
    /// Admin message rendered as AI in the customer projection.
    pub appears_as_ai: bool,
    /// Where an automated reply came from (AI messages only).
    pub ai_source: Option<ReplySource>,
    /// Confidence of an automated reply in [0, 1] (AI messages only).
    pub ai_confidence: Option<f64>,
    /// Generation latency in milliseconds (AI messages only).
    pub ai_latency_ms: Option<u64>,
    /// Matched fallback intent, e.g. "price_inquiry" (AI messages only).
    pub ai_intent: Option<String>,
    /// Set when an admin corrected this AI reply.
    pub corrected: bool,
    pub correction: Option<String>,
    pub correction_reason: Option<String>,
    pub language: Option<Language>,
}

impl Message {
    /// Build a customer message.
    pub fn user(conversation_id: Uuid, content: String, language: Language) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            kind: MessageKind::User,
            content,
            created_at: Utc::now(),
            visibility: Visibility::Public,
            is_internal: false,
            sender_role: Role::Customer,
            sender_id: None,
            sender_name: None,
            appears_as_ai: false,
            ai_source: None,
            ai_confidence: None,
            ai_latency_ms: None,
            ai_intent: None,
            corrected: false,
            correction: None,
            correction_reason: None,
            language: Some(language),
        }
    }

    /// Build an automated reply.
    pub fn ai(
        conversation_id: Uuid,
        content: String,
        source: ReplySource,
        confidence: f64,
        latency_ms: u64,
        intent: Option<String>,
        language: Language,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            kind: MessageKind::Ai,
            content,
            created_at: Utc::now(),
            visibility: Visibility::Public,
            is_internal: false,
            sender_role: Role::System,
            sender_id: None,
            sender_name: None,
            appears_as_ai: false,
            ai_source: Some(source),
            ai_confidence: Some(confidence),
            ai_latency_ms: Some(latency_ms),
            ai_intent: intent,
            corrected: false,
            correction: None,
            correction_reason: None,
            language: Some(language),
        }
    }

    /// Build an admin reply to the customer.
    pub fn admin(
        conversation_id: Uuid,
        content: String,
        admin_id: Uuid,
        admin_name: String,
        role: Role,
        appears_as_ai: bool,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            // Always stored as an admin message; the customer projection
            // re-kinds it when `appears_as_ai` is set.
            kind: MessageKind::Admin,
            content,
            created_at: Utc::now(),
            visibility: Visibility::Public,
            is_internal: false,
            sender_role: role,
            sender_id: Some(admin_id),
            sender_name: Some(admin_name),
            appears_as_ai,
            ai_source: None,
            ai_confidence: None,
            ai_latency_ms: None,
            ai_intent: None,
            corrected: false,
            correction: None,
            correction_reason: None,
            language: None,
        }
    }

    /// Build an internal admin-only note.
    pub fn internal(
        conversation_id: Uuid,
        content: String,
        admin_id: Uuid,
        admin_name: String,
        role: Role,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            kind: MessageKind::Internal,
            content,
            created_at: Utc::now(),
            visibility,
            is_internal: true,
            sender_role: role,
            sender_id: Some(admin_id),
            sender_name: Some(admin_name),
            appears_as_ai: false,
            ai_source: None,
            ai_confidence: None,
            ai_latency_ms: None,
            ai_intent: None,
            corrected: false,
            correction: None,
            correction_reason: None,
            language: None,
        }
    }

    /// Build a service-generated system message (admin-visible only).
    pub fn system(conversation_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            kind: MessageKind::System,
            content,
            created_at: Utc::now(),
            visibility: Visibility::AdminOnly,
            is_internal: true,
            sender_role: Role::System,
            sender_id: None,
            sender_name: None,
            appears_as_ai: false,
            ai_source: None,
            ai_confidence: None,
            ai_latency_ms: None,
            ai_intent: None,
            corrected: false,
            correction: None,
            correction_reason: None,
            language: None,
        }
    }
}
