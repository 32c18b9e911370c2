//! Learning-capture types for Handover.
//!
//! When an admin corrects an AI reply, the (customer message, AI reply,
//! correction) triple is recorded for later analysis. Records are immutable
//! once created, except the `applied_to_training` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::Language;

/// An admin correction of an AI reply, recorded for learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// The customer message that prompted the AI reply.
    pub customer_message: String,
    /// The AI reply that was corrected.
    pub ai_reply: String,
    /// The admin's corrected text.
    pub admin_correction: String,
    pub reason: Option<String>,
    /// Category of improvement, e.g. "tone", "accuracy".
    pub category: Option<String>,
    pub language: Language,
    pub admin_id: Option<Uuid>,
    pub admin_name: Option<String>,
    pub confidence_before: f64,
    pub confidence_after: f64,
    /// Set once the record has been fed into training; the only mutable field.
    pub applied_to_training: bool,
    pub created_at: DateTime<Utc>,
}

impl LearningRecord {
    pub fn new(
        conversation_id: Uuid,
        customer_message: String,
        ai_reply: String,
        admin_correction: String,
        language: Language,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            customer_message,
            ai_reply,
            admin_correction,
            reason: None,
            category: None,
            language,
            admin_id: None,
            admin_name: None,
            confidence_before: 0.0,
            confidence_after: 0.0,
            applied_to_training: false,
            created_at: Utc::now(),
        }
    }
}
