//! Chat orchestration: conversation lifecycle, message routing, history.
//!
//! `ChatService` coordinates the repositories, the takeover arbitrator,
//! and the responder. The routing rule is the heart of the service: a
//! customer message on an owned conversation goes to the owning admin
//! and produces no automated reply; on an unowned conversation the
//! responder always answers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use handover_types::admin::AdminIdentity;
use handover_types::conversation::{Conversation, ConversationStatus, Priority};
use handover_types::error::{ChatError, RepositoryError};
use handover_types::event::ChatEvent;
use handover_types::message::{Message, MessageKind, Role, Visibility};

use crate::event::EventBus;
use crate::language;
use crate::provider::TextProvider;
use crate::repository::{
    AdminSessionRepository, ConversationRepository, MessageRepository, ReplyCacheRepository,
};
use crate::respond::Responder;
use crate::takeover::TakeoverArbitrator;
use crate::visibility::{self, MessageView};

/// How many prior turns are sent to the provider as context.
const HISTORY_TURNS: i64 = 10;

/// One handled customer message: what was stored, what was answered.
#[derive(Debug, Clone)]
pub struct CustomerTurn {
    pub conversation: Conversation,
    pub user_message: Message,
    /// None when an admin owns the conversation and will answer manually.
    pub auto_reply: Option<Message>,
}

/// Orchestrates the full conversation lifecycle.
///
/// Generic over the repository and provider implementations so the whole
/// flow is testable with in-memory fakes.
pub struct ChatService<C, M, A, Q, P>
where
    C: ConversationRepository,
    M: MessageRepository,
    A: AdminSessionRepository,
    Q: ReplyCacheRepository,
    P: TextProvider,
{
    conversations: C,
    messages: M,
    arbitrator: Arc<TakeoverArbitrator<C, M, A>>,
    responder: Arc<Responder<Q, P>>,
    bus: EventBus,
}

impl<C, M, A, Q, P> ChatService<C, M, A, Q, P>
where
    C: ConversationRepository + Clone + 'static,
    M: MessageRepository + Clone + 'static,
    A: AdminSessionRepository,
    Q: ReplyCacheRepository + 'static,
    P: TextProvider + 'static,
{
    pub fn new(
        conversations: C,
        messages: M,
        arbitrator: Arc<TakeoverArbitrator<C, M, A>>,
        responder: Arc<Responder<Q, P>>,
        bus: EventBus,
    ) -> Self {
        Self {
            conversations,
            messages,
            arbitrator,
            responder,
            bus,
        }
    }

    pub fn arbitrator(&self) -> &Arc<TakeoverArbitrator<C, M, A>> {
        &self.arbitrator
    }

    pub fn responder(&self) -> &Arc<Responder<Q, P>> {
        &self.responder
    }

    /// Find or create the conversation for a customer session key.
    pub async fn open_conversation(
        &self,
        session_key: &str,
        customer_id: Option<Uuid>,
    ) -> Result<Conversation, ChatError> {
        self.ensure_conversation(session_key, customer_id, Default::default())
            .await
    }

    async fn ensure_conversation(
        &self,
        session_key: &str,
        customer_id: Option<Uuid>,
        language: handover_types::conversation::Language,
    ) -> Result<Conversation, ChatError> {
        if let Some(existing) = self
            .conversations
            .get_by_session_key(session_key)
            .await
            .map_err(storage)?
        {
            return Ok(existing);
        }

        let mut conversation = Conversation::new(session_key.to_string(), language);
        conversation.customer_id = customer_id;
        self.conversations
            .create(&conversation)
            .await
            .map_err(storage)?;

        info!(conversation_id = %conversation.id, session_key, "conversation opened");
        self.bus.publish(ChatEvent::ConversationOpened {
            conversation_id: conversation.id,
            session_key: session_key.to_string(),
            language: conversation.language,
        });
        Ok(conversation)
    }

    /// Handle an inbound customer message end to end.
    ///
    /// Stores the message, then either leaves the reply to the owning
    /// admin or asks the responder. The responder path cannot fail, so a
    /// customer on an unowned conversation always gets an answer.
    pub async fn handle_customer_message(
        &self,
        session_key: &str,
        content: &str,
        customer_id: Option<Uuid>,
    ) -> Result<CustomerTurn, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let detected = language::detect(content);
        let conversation = self
            .ensure_conversation(session_key, customer_id, detected)
            .await?;

        let user_message = Message::user(conversation.id, content.to_string(), detected);
        self.messages
            .insert(&user_message)
            .await
            .map_err(storage)?;
        self.conversations
            .touch(&conversation.id, user_message.created_at, false)
            .await
            .map_err(storage)?;
        self.bus.publish(ChatEvent::NewMessage {
            conversation_id: conversation.id,
            message: user_message.clone(),
        });

        if self
            .arbitrator
            .is_owned(conversation.id)
            .await
            .map_err(storage)?
        {
            debug!(conversation_id = %conversation.id, "owned conversation, no auto reply");
            return Ok(CustomerTurn {
                conversation,
                user_message,
                auto_reply: None,
            });
        }

        let history = self.provider_history(&conversation.id).await;
        let prompt = language::system_prompt(detected);

        // Detached so a caller that disconnects mid-generation does not
        // cancel the reply; it is still persisted and broadcast, and the
        // customer picks it up from history on reconnect.
        let conversation_id = conversation.id;
        let content_owned = content.to_string();
        let responder = Arc::clone(&self.responder);
        let messages = self.messages.clone();
        let conversations = self.conversations.clone();
        let bus = self.bus.clone();
        let reply_task = tokio::spawn(async move {
            let outcome = responder
                .respond(&content_owned, detected, &prompt, &history)
                .await;
            let reply = Message::ai(
                conversation_id,
                outcome.content,
                outcome.source,
                outcome.confidence,
                outcome.latency_ms,
                outcome.intent,
                detected,
            );
            messages.insert(&reply).await?;
            conversations
                .touch(&conversation_id, reply.created_at, false)
                .await?;
            bus.publish(ChatEvent::NewMessage {
                conversation_id,
                message: reply.clone(),
            });
            Ok::<Message, RepositoryError>(reply)
        });

        let reply = reply_task
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?
            .map_err(storage)?;

        Ok(CustomerTurn {
            conversation,
            user_message,
            auto_reply: Some(reply),
        })
    }

    /// Store and broadcast an admin reply on an owned conversation.
    ///
    /// Requires the sender to be the current owner. With `appears_as_ai`
    /// the customer sees it as an assistant reply; the true author is
    /// persisted either way.
    pub async fn send_admin_message(
        &self,
        conversation_id: Uuid,
        admin: &AdminIdentity,
        content: &str,
        appears_as_ai: bool,
    ) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let owner = self
            .arbitrator
            .owner_of(conversation_id)
            .await
            .map_err(storage)?;
        if owner.map(|o| o.admin_id) != Some(admin.admin_id) {
            return Err(ChatError::NotOwner);
        }

        let message = Message::admin(
            conversation_id,
            content.to_string(),
            admin.admin_id,
            admin.admin_name.clone(),
            admin.role,
            appears_as_ai,
        );
        self.messages.insert(&message).await.map_err(storage)?;
        self.conversations
            .touch(&conversation_id, message.created_at, false)
            .await
            .map_err(storage)?;
        self.bus.publish(ChatEvent::NewMessage {
            conversation_id,
            message: message.clone(),
        });
        Ok(message)
    }

    /// Store and broadcast an internal note.
    ///
    /// Notes never reach customers and do not require ownership; any
    /// admin can annotate any conversation.
    pub async fn add_internal_note(
        &self,
        conversation_id: Uuid,
        admin: &AdminIdentity,
        content: &str,
        visibility: Visibility,
    ) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let note = Message::internal(
            conversation_id,
            content.to_string(),
            admin.admin_id,
            admin.admin_name.clone(),
            admin.role,
            visibility,
        );
        self.messages.insert(&note).await.map_err(storage)?;
        self.conversations
            .touch(&conversation_id, note.created_at, true)
            .await
            .map_err(storage)?;
        self.bus.publish(ChatEvent::NewMessage {
            conversation_id,
            message: note.clone(),
        });
        Ok(note)
    }

    /// A page of history projected for one viewer role.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        viewer: Role,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageView>, ChatError> {
        let page = self
            .messages
            .list_page(&conversation_id, limit, before)
            .await
            .map_err(storage)?;
        Ok(visibility::project_page(&page, viewer))
    }

    /// Escalate a conversation for priority handling.
    pub async fn escalate(
        &self,
        conversation_id: Uuid,
        priority: Priority,
        admin: &AdminIdentity,
    ) -> Result<(), ChatError> {
        self.conversations
            .set_status(
                &conversation_id,
                ConversationStatus::Escalated,
                Some(priority),
            )
            .await
            .map_err(storage)?;
        info!(%conversation_id, ?priority, admin = %admin.admin_name, "conversation escalated");
        self.bus.publish(ChatEvent::Escalated {
            conversation_id,
            priority,
            escalated_by: admin.admin_id,
        });
        Ok(())
    }

    /// Close a conversation. Terminal transition.
    pub async fn close(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.conversations
            .set_status(&conversation_id, ConversationStatus::Closed, None)
            .await
            .map_err(storage)
    }

    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, ChatError> {
        self.conversations.get(&conversation_id).await.map_err(storage)
    }

    /// Conversations awaiting or under admin attention.
    pub async fn list_by_status(
        &self,
        status: ConversationStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, ChatError> {
        self.conversations
            .list_by_status(status, limit, offset)
            .await
            .map_err(storage)
    }

    /// The last few user/assistant turns in provider wire format.
    async fn provider_history(&self, conversation_id: &Uuid) -> Vec<(String, String)> {
        match self
            .messages
            .list_page(conversation_id, HISTORY_TURNS, None)
            .await
        {
            Ok(page) => page
                .iter()
                .filter_map(|m| match m.kind {
                    MessageKind::User => Some(("user".to_string(), m.content.clone())),
                    MessageKind::Ai => Some(("assistant".to_string(), m.content.clone())),
                    // Masked admin replies read as assistant turns.
                    MessageKind::Admin if m.appears_as_ai => {
                        Some(("assistant".to_string(), m.content.clone()))
                    }
                    _ => None,
                })
                .collect(),
            Err(error) => {
                debug!(%error, "history unavailable, answering without context");
                Vec::new()
            }
        }
    }
}

fn storage(error: RepositoryError) -> ChatError {
    ChatError::Storage(error.to_string())
}
