//! In-memory repository fakes shared by the integration tests.
//!
//! `MemoryStore` implements every repository trait over mutex-guarded
//! maps, mirroring the durable store's conditional-update contract:
//! `claim_ownership` succeeds for exactly one caller while an owner is
//! set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use handover_core::chat::ChatService;
use handover_core::event::EventBus;
use handover_core::provider::TextProvider;
use handover_core::repository::{
    AdminSessionRepository, ConversationRepository, MessageRepository, ReplyCacheRepository,
};
use handover_core::respond::Responder;
use handover_core::takeover::TakeoverArbitrator;
use handover_types::admin::{AdminIdentity, AdminSession, AdminStatus};
use handover_types::config::ResponderConfig;
use handover_types::conversation::{Conversation, ConversationStatus, Priority};
use handover_types::error::RepositoryError;
use handover_types::message::{Message, Role};
use handover_types::provider::{CachedReply, GenerateRequest, GeneratedText, ProviderError};

#[derive(Default, Clone)]
pub struct MemoryStore {
    pub conversations: Arc<Mutex<HashMap<Uuid, Conversation>>>,
    pub messages: Arc<Mutex<Vec<Message>>>,
    pub admins: Arc<Mutex<HashMap<Uuid, AdminSession>>>,
    pub cache: Arc<Mutex<HashMap<String, CachedReply>>>,
    pub learning: Arc<Mutex<Vec<handover_types::learning::LearningRecord>>>,
}

impl ConversationRepository for MemoryStore {
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversations.lock().unwrap().get(id).cloned())
    }

    async fn get_by_session_key(
        &self,
        session_key: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .values()
            .find(|c| c.session_key == session_key)
            .cloned())
    }

    async fn list_by_status(
        &self,
        status: ConversationStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut all: Vec<_> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        all.sort_by_key(|c| std::cmp::Reverse(c.last_activity));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn claim_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
        admin_name: &str,
        owned_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let Some(conversation) = conversations.get_mut(conversation_id) else {
            return Ok(false);
        };
        if conversation.owner_admin_id.is_some()
            || conversation.status == ConversationStatus::Closed
        {
            return Ok(false);
        }
        conversation.owner_admin_id = Some(*admin_id);
        conversation.owner_admin_name = Some(admin_name.to_string());
        conversation.owned_at = Some(owned_at);
        conversation.status = ConversationStatus::AdminTaken;
        Ok(true)
    }

    async fn release_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let Some(conversation) = conversations.get_mut(conversation_id) else {
            return Ok(false);
        };
        if conversation.owner_admin_id != Some(*admin_id) {
            return Ok(false);
        }
        conversation.owner_admin_id = None;
        conversation.owner_admin_name = None;
        conversation.owned_at = None;
        conversation.status = ConversationStatus::Active;
        Ok(true)
    }

    async fn release_owned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let mut released = Vec::new();
        for conversation in conversations.values_mut() {
            if conversation.owner_admin_id.is_some() && conversation.last_activity < cutoff {
                released.push(conversation.clone());
                conversation.owner_admin_id = None;
                conversation.owner_admin_name = None;
                conversation.owned_at = None;
                conversation.status = ConversationStatus::Active;
            }
        }
        Ok(released)
    }

    async fn set_status(
        &self,
        conversation_id: &Uuid,
        status: ConversationStatus,
        priority: Option<Priority>,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.status = status;
        if let Some(priority) = priority {
            conversation.priority = priority;
        }
        Ok(())
    }

    async fn record_activity(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.last_activity = at;
        Ok(())
    }

    async fn touch(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
        internal: bool,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.last_activity = at;
        if internal {
            conversation.internal_message_count += 1;
        } else {
            conversation.message_count += 1;
        }
        Ok(())
    }

    async fn record_correction(&self, conversation_id: &Uuid) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.correction_count += 1;
        Ok(())
    }
}

impl MessageRepository for MemoryStore {
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Message>, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == *id)
            .cloned())
    }

    async fn list_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.lock().unwrap();
        let mut page: Vec<_> = messages
            .iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .filter(|m| before.is_none_or(|cursor| m.created_at < cursor))
            .cloned()
            .collect();
        page.sort_by_key(|m| m.created_at);
        let skip = page.len().saturating_sub(limit as usize);
        Ok(page.into_iter().skip(skip).collect())
    }

    async fn mark_corrected(
        &self,
        message_id: &Uuid,
        correction: &str,
        reason: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.id == *message_id)
            .ok_or(RepositoryError::NotFound)?;
        message.corrected = true;
        message.correction = Some(correction.to_string());
        message.correction_reason = reason.map(str::to_string);
        Ok(())
    }
}

impl AdminSessionRepository for MemoryStore {
    async fn upsert(&self, session: &AdminSession) -> Result<(), RepositoryError> {
        self.admins
            .lock()
            .unwrap()
            .insert(session.admin_id, session.clone());
        Ok(())
    }

    async fn get(&self, admin_id: &Uuid) -> Result<Option<AdminSession>, RepositoryError> {
        Ok(self.admins.lock().unwrap().get(admin_id).cloned())
    }

    async fn list_online(&self) -> Result<Vec<AdminSession>, RepositoryError> {
        Ok(self
            .admins
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == AdminStatus::Online)
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        admin_id: &Uuid,
        status: AdminStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut admins = self.admins.lock().unwrap();
        let session = admins.get_mut(admin_id).ok_or(RepositoryError::NotFound)?;
        session.status = status;
        session.last_seen = at;
        Ok(())
    }

    async fn owned_count(&self, admin_id: &Uuid) -> Result<i64, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_admin_id == Some(*admin_id))
            .count() as i64)
    }
}

impl ReplyCacheRepository for MemoryStore {
    async fn get(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedReply>, RepositoryError> {
        Ok(self
            .cache
            .lock()
            .unwrap()
            .get(cache_key)
            .filter(|r| r.is_fresh(now))
            .cloned())
    }

    async fn put(&self, reply: &CachedReply) -> Result<(), RepositoryError> {
        self.cache
            .lock()
            .unwrap()
            .insert(reply.cache_key.clone(), reply.clone());
        Ok(())
    }

    async fn record_hit(&self, _cache_key: &str) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Ok(0)
    }
}

impl handover_core::repository::LearningRepository for MemoryStore {
    async fn insert(
        &self,
        record: &handover_types::learning::LearningRecord,
    ) -> Result<(), RepositoryError> {
        self.learning.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<handover_types::learning::LearningRecord>, RepositoryError> {
        Ok(self
            .learning
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.applied_to_training)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_applied(&self, record_id: &Uuid) -> Result<(), RepositoryError> {
        let mut learning = self.learning.lock().unwrap();
        let record = learning
            .iter_mut()
            .find(|r| r.id == *record_id)
            .ok_or(RepositoryError::NotFound)?;
        record.applied_to_training = true;
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.learning.lock().unwrap().len() as i64)
    }
}

/// Provider that echoes the request back, never failing.
pub struct EchoProvider;

impl TextProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        Ok(GeneratedText {
            content: format!("echo: {}", request.message),
            model: Some("echo-1".to_string()),
        })
    }
}

pub fn admin(name: &str) -> AdminIdentity {
    AdminIdentity {
        admin_id: Uuid::now_v7(),
        admin_name: name.to_string(),
        role: Role::Admin,
    }
}

pub type MemoryChatService =
    ChatService<MemoryStore, MemoryStore, MemoryStore, MemoryStore, EchoProvider>;

pub fn service(store: MemoryStore, bus: EventBus) -> MemoryChatService {
    let arbitrator = Arc::new(TakeoverArbitrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        bus.clone(),
    ));
    let responder = Arc::new(Responder::new(
        store.clone(),
        EchoProvider,
        ResponderConfig {
            retry_base_delay_secs: 0,
            ..ResponderConfig::default()
        },
    ));
    ChatService::new(store.clone(), store, arbitrator, responder, bus)
}
