//! Event types for the Handover realtime event bus.
//!
//! `ChatEvent` is the unified event type broadcast after a chat state
//! change has been committed to storage. Subscribers (WebSocket sessions,
//! the stats endpoint) receive events in publish order. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{Language, Priority};
use crate::message::Message;

/// Events emitted after committed chat state changes.
///
/// `NewMessage` carries the full stored message. Each WebSocket session
/// projects it through the visibility filter for its own viewer role
/// before anything reaches the wire, so carrying internal fields here
/// is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A new conversation has been opened by a customer.
    ConversationOpened {
        conversation_id: Uuid,
        session_key: String,
        language: Language,
    },

    /// A message has been stored on a conversation.
    NewMessage {
        conversation_id: Uuid,
        message: Message,
    },

    /// An admin has taken ownership of a conversation.
    TakeoverGranted {
        conversation_id: Uuid,
        admin_id: Uuid,
        admin_name: String,
    },

    /// Ownership has been released and the conversation returned to
    /// automatic responses.
    TakeoverReleased {
        conversation_id: Uuid,
        admin_id: Uuid,
        /// "manual" or "inactivity".
        reason: String,
    },

    /// A conversation has been escalated for priority handling.
    Escalated {
        conversation_id: Uuid,
        priority: Priority,
        escalated_by: Uuid,
    },

    /// A participant started or stopped typing.
    Typing {
        conversation_id: Uuid,
        sender_name: String,
        is_admin: bool,
        is_typing: bool,
    },

    /// An admin correction has been captured for training.
    CorrectionCaptured {
        conversation_id: Uuid,
        message_id: Uuid,
        learning_record_id: Uuid,
    },
}

impl ChatEvent {
    /// The conversation this event belongs to. Sessions use this to
    /// filter the shared broadcast stream down to their own room.
    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::ConversationOpened {
                conversation_id, ..
            }
            | Self::NewMessage {
                conversation_id, ..
            }
            | Self::TakeoverGranted {
                conversation_id, ..
            }
            | Self::TakeoverReleased {
                conversation_id, ..
            }
            | Self::Escalated {
                conversation_id, ..
            }
            | Self::Typing {
                conversation_id, ..
            }
            | Self::CorrectionCaptured {
                conversation_id, ..
            } => *conversation_id,
        }
    }
}
