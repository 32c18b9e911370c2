//! Conversation domain types for Handover.
//!
//! A conversation is one customer support session, possibly spanning multiple
//! ownership changes. Conversations are created on first customer contact and
//! are never deleted, only transitioned to `Closed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a conversation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'admin_taken', 'escalated', 'closed'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    AdminTaken,
    Escalated,
    Closed,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::AdminTaken => write!(f, "admin_taken"),
            ConversationStatus::Escalated => write!(f, "escalated"),
            ConversationStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConversationStatus::Active),
            "admin_taken" => Ok(ConversationStatus::AdminTaken),
            "escalated" => Ok(ConversationStatus::Escalated),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(format!("invalid conversation status: '{other}'")),
        }
    }
}

impl Default for ConversationStatus {
    fn default() -> Self {
        ConversationStatus::Active
    }
}

/// Priority of a conversation, raised on escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("invalid priority: '{other}'")),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Language the conversation is being held in.
///
/// Detected from message text; controls the system prompt and the localized
/// fallback templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    NepaliDevanagari,
    NepaliRomanized,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "english"),
            Language::NepaliDevanagari => write!(f, "nepali_devanagari"),
            Language::NepaliRomanized => write!(f, "nepali_romanized"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" => Ok(Language::English),
            "nepali_devanagari" => Ok(Language::NepaliDevanagari),
            "nepali_romanized" => Ok(Language::NepaliRomanized),
            other => Err(format!("invalid language: '{other}'")),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

/// A customer support conversation.
///
/// Invariant: `status == AdminTaken` exactly when `owner_admin_id` is set;
/// at most one owner at any instant. The durable store enforces this through
/// a conditional update, not application-side locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// Opaque key identifying the customer's browser session.
    pub session_key: String,
    /// Customer account id if they were logged in; None for anonymous.
    pub customer_id: Option<Uuid>,
    pub status: ConversationStatus,
    /// The admin currently owning this conversation, if taken over.
    pub owner_admin_id: Option<Uuid>,
    /// Display name of the owning admin (denormalized for broadcasts).
    pub owner_admin_name: Option<String>,
    /// When the current ownership began.
    pub owned_at: Option<DateTime<Utc>>,
    pub language: Language,
    pub priority: Priority,
    pub message_count: u32,
    pub internal_message_count: u32,
    /// Number of admin corrections captured for learning.
    pub correction_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    /// Create a fresh conversation for a customer session key.
    pub fn new(session_key: impl Into<String>, language: Language) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            session_key: session_key.into(),
            customer_id: None,
            status: ConversationStatus::Active,
            owner_admin_id: None,
            owner_admin_name: None,
            owned_at: None,
            language,
            priority: Priority::Normal,
            message_count: 0,
            internal_message_count: 0,
            correction_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Whether an admin currently owns this conversation.
    pub fn is_owned(&self) -> bool {
        self.owner_admin_id.is_some()
    }
}
