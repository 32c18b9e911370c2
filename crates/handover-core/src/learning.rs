//! Capture of admin corrections for later training.
//!
//! When an admin corrects an automated reply, three things happen in
//! order: the original message is annotated, a learning record is stored,
//! and the corrected text is appended to the conversation as a fresh
//! reply the customer sees as coming from the assistant.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use handover_types::admin::AdminIdentity;
use handover_types::error::{LearningError, RepositoryError};
use handover_types::event::ChatEvent;
use handover_types::learning::LearningRecord;
use handover_types::message::{Message, MessageKind};

use crate::event::EventBus;
use crate::repository::{ConversationRepository, LearningRepository, MessageRepository};

/// Confidence assigned to an admin-authored correction.
const CORRECTED_CONFIDENCE: f64 = 1.0;

/// An admin's correction of one automated reply.
#[derive(Debug, Clone)]
pub struct Correction {
    pub message_id: Uuid,
    pub corrected_text: String,
    pub reason: Option<String>,
    /// Category of improvement, e.g. "tone", "accuracy".
    pub category: Option<String>,
}

/// Validation failure building a correction.
#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("corrected text must not be empty")]
    EmptyText,
}

impl Correction {
    pub fn new(message_id: Uuid, corrected_text: String) -> Result<Self, CorrectionError> {
        if corrected_text.trim().is_empty() {
            return Err(CorrectionError::EmptyText);
        }
        Ok(Self {
            message_id,
            corrected_text,
            reason: None,
            category: None,
        })
    }
}

/// Orchestrates the correction flow.
pub struct LearningCapture<C, M, L>
where
    C: ConversationRepository,
    M: MessageRepository,
    L: LearningRepository,
{
    conversations: C,
    messages: M,
    learning: L,
    bus: EventBus,
}

impl<C, M, L> LearningCapture<C, M, L>
where
    C: ConversationRepository,
    M: MessageRepository,
    L: LearningRepository,
{
    pub fn new(conversations: C, messages: M, learning: L, bus: EventBus) -> Self {
        Self {
            conversations,
            messages,
            learning,
            bus,
        }
    }

    /// Apply an admin correction to an automated reply.
    ///
    /// Returns the appended replacement message. The original stays in
    /// history, annotated; admins see both, customers see both but with
    /// the replacement presented as a normal assistant reply.
    pub async fn capture(
        &self,
        correction: Correction,
        admin: &AdminIdentity,
    ) -> Result<Message, LearningError> {
        let original = self
            .messages
            .get(&correction.message_id)
            .await
            .map_err(storage)?
            .ok_or(LearningError::MessageNotFound)?;

        if original.kind != MessageKind::Ai {
            return Err(LearningError::NotAiReply);
        }
        if original.corrected {
            return Err(LearningError::AlreadyCorrected);
        }

        self.messages
            .mark_corrected(
                &original.id,
                &correction.corrected_text,
                correction.reason.as_deref(),
            )
            .await
            .map_err(storage)?;

        let customer_message = self.preceding_customer_message(&original).await;

        let language = original.language.unwrap_or_default();
        let mut record = LearningRecord::new(
            original.conversation_id,
            customer_message.unwrap_or_default(),
            original.content.clone(),
            correction.corrected_text.clone(),
            language,
        );
        record.reason = correction.reason.clone();
        record.category = correction.category.clone();
        record.admin_id = Some(admin.admin_id);
        record.admin_name = Some(admin.admin_name.clone());
        record.confidence_before = original.ai_confidence.unwrap_or(0.0);
        record.confidence_after = CORRECTED_CONFIDENCE;

        // Learning bookkeeping failures are logged and swallowed; only the
        // message writes below may abort the flow, since losing them would
        // lose the corrected reply itself.
        if let Err(error) = self.learning.insert(&record).await {
            warn!(%error, record_id = %record.id, "failed to store learning record");
        }
        if let Err(error) = self
            .conversations
            .record_correction(&original.conversation_id)
            .await
        {
            warn!(%error, "failed to bump the correction counter");
        }

        // The replacement goes out under the assistant's name; the true
        // author is still on record.
        let replacement = Message::admin(
            original.conversation_id,
            correction.corrected_text,
            admin.admin_id,
            admin.admin_name.clone(),
            admin.role,
            true,
        );
        self.messages.insert(&replacement).await.map_err(storage)?;
        self.conversations
            .touch(&original.conversation_id, Utc::now(), false)
            .await
            .map_err(storage)?;

        info!(
            message_id = %original.id,
            record_id = %record.id,
            admin = %admin.admin_name,
            "correction captured"
        );

        self.bus.publish(ChatEvent::NewMessage {
            conversation_id: replacement.conversation_id,
            message: replacement.clone(),
        });
        self.bus.publish(ChatEvent::CorrectionCaptured {
            conversation_id: replacement.conversation_id,
            message_id: original.id,
            learning_record_id: record.id,
        });

        Ok(replacement)
    }

    /// The customer message the corrected reply was answering, if it can
    /// be found in the recent history.
    async fn preceding_customer_message(&self, original: &Message) -> Option<String> {
        match self
            .messages
            .list_page(&original.conversation_id, 20, Some(original.created_at))
            .await
        {
            Ok(page) => page
                .iter()
                .rev()
                .find(|m| m.kind == MessageKind::User)
                .map(|m| m.content.clone()),
            Err(error) => {
                warn!(%error, "failed to load history for learning record");
                None
            }
        }
    }
}

fn storage(error: RepositoryError) -> LearningError {
    LearningError::Storage(error.to_string())
}
