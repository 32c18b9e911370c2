//! Conversation ownership arbitration.
//!
//! At most one admin owns a conversation at a time. The durable store is
//! the single arbiter: claims are conditional updates that succeed for
//! exactly one caller, and every other path (routing, broadcasts) reads
//! ownership from the arbitrator. The in-process map is only a cache of
//! what the store last told us; losing it on restart is harmless.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use handover_types::admin::{AdminIdentity, AdminSession};
use handover_types::conversation::{Conversation, ConversationStatus};
use handover_types::error::{RepositoryError, TakeoverError};
use handover_types::event::ChatEvent;
use handover_types::message::Message;

use crate::event::EventBus;
use crate::repository::{AdminSessionRepository, ConversationRepository, MessageRepository};

/// Cached owner entry, keyed by conversation id.
#[derive(Debug, Clone)]
struct Owner {
    admin_id: Uuid,
    admin_name: String,
}

/// Serializes ownership changes through conditional store updates.
pub struct TakeoverArbitrator<C, M, A>
where
    C: ConversationRepository,
    M: MessageRepository,
    A: AdminSessionRepository,
{
    conversations: C,
    messages: M,
    admins: A,
    bus: EventBus,
    owners: DashMap<Uuid, Owner>,
}

impl<C, M, A> TakeoverArbitrator<C, M, A>
where
    C: ConversationRepository,
    M: MessageRepository,
    A: AdminSessionRepository,
{
    pub fn new(conversations: C, messages: M, admins: A, bus: EventBus) -> Self {
        Self {
            conversations,
            messages,
            admins,
            bus,
            owners: DashMap::new(),
        }
    }

    /// Attempt to take ownership of a conversation for `admin`.
    ///
    /// Exactly one of any number of concurrent callers wins; the rest get
    /// `AlreadyOwned` naming the winner. A repeated call by the current
    /// owner succeeds without re-claiming. On success a system message is
    /// recorded and a `TakeoverGranted` event published.
    pub async fn request_takeover(
        &self,
        conversation_id: Uuid,
        admin: &AdminIdentity,
    ) -> Result<Conversation, TakeoverError> {
        let owned = self
            .admins
            .owned_count(&admin.admin_id)
            .await
            .map_err(storage)?;
        if owned as usize >= AdminSession::MAX_CONCURRENT {
            // The cap blocks new claims only; repeating the call on a
            // conversation this admin already owns still succeeds.
            if let Some(current) =
                self.conversations.get(&conversation_id).await.map_err(storage)?
            {
                if current.owner_admin_id == Some(admin.admin_id) {
                    return Ok(current);
                }
            }
            return Err(TakeoverError::TooManyConversations);
        }

        let now = Utc::now();
        let mut claimed = false;
        // The second attempt covers the window where the previous owner
        // released between a failed claim and the follow-up read.
        for _ in 0..2 {
            if self
                .conversations
                .claim_ownership(&conversation_id, &admin.admin_id, &admin.admin_name, now)
                .await
                .map_err(storage)?
            {
                claimed = true;
                break;
            }

            let Some(current) =
                self.conversations.get(&conversation_id).await.map_err(storage)?
            else {
                return Err(TakeoverError::NotFound);
            };
            if current.owner_admin_id == Some(admin.admin_id) {
                // Repeated call by the current owner.
                return Ok(current);
            }
            if current.status == ConversationStatus::Closed {
                return Err(TakeoverError::Closed);
            }
            if let (Some(owner_id), Some(owner_name)) =
                (current.owner_admin_id, current.owner_admin_name)
            {
                self.owners.insert(
                    conversation_id,
                    Owner {
                        admin_id: owner_id,
                        admin_name: owner_name.clone(),
                    },
                );
                return Err(TakeoverError::AlreadyOwned {
                    owner_id,
                    owner_name,
                });
            }
        }
        if !claimed {
            return Err(TakeoverError::Storage(
                "ownership changed concurrently".to_string(),
            ));
        }

        self.owners.insert(
            conversation_id,
            Owner {
                admin_id: admin.admin_id,
                admin_name: admin.admin_name.clone(),
            },
        );

        let notice = Message::system(
            conversation_id,
            format!("{} has joined the conversation", admin.admin_name),
        );
        if let Err(error) = self.messages.insert(&notice).await {
            warn!(%error, "failed to store takeover notice");
        }

        info!(%conversation_id, admin = %admin.admin_name, "takeover granted");
        self.bus.publish(ChatEvent::TakeoverGranted {
            conversation_id,
            admin_id: admin.admin_id,
            admin_name: admin.admin_name.clone(),
        });

        self.conversations
            .get(&conversation_id)
            .await
            .map_err(storage)?
            .ok_or(TakeoverError::NotFound)
    }

    /// Release ownership held by `admin_id`.
    ///
    /// Conditional on the caller being the current owner. Publishes a
    /// `TakeoverReleased` event with reason "manual".
    pub async fn release(
        &self,
        conversation_id: Uuid,
        admin_id: Uuid,
    ) -> Result<(), TakeoverError> {
        let released = self
            .conversations
            .release_ownership(&conversation_id, &admin_id)
            .await
            .map_err(storage)?;
        if !released {
            return Err(TakeoverError::NotOwner);
        }

        self.owners.remove(&conversation_id);

        let notice = Message::system(
            conversation_id,
            "The conversation has been returned to the assistant".to_string(),
        );
        if let Err(error) = self.messages.insert(&notice).await {
            warn!(%error, "failed to store release notice");
        }

        info!(%conversation_id, %admin_id, "ownership released");
        self.bus.publish(ChatEvent::TakeoverReleased {
            conversation_id,
            admin_id,
            reason: "manual".to_string(),
        });
        Ok(())
    }

    /// Release every conversation whose owner went idle.
    ///
    /// Called by the background sweep. Returns the conversations that were
    /// released.
    pub async fn sweep_inactive(
        &self,
        inactivity_timeout: Duration,
    ) -> Result<Vec<Conversation>, TakeoverError> {
        let cutoff = Utc::now()
            - chrono::Duration::seconds(inactivity_timeout.as_secs() as i64);
        let released = self
            .conversations
            .release_owned_before(cutoff)
            .await
            .map_err(storage)?;

        for conversation in &released {
            self.owners.remove(&conversation.id);
            let admin_id = conversation.owner_admin_id.unwrap_or_else(Uuid::nil);
            info!(conversation_id = %conversation.id, "ownership lapsed after inactivity");
            self.bus.publish(ChatEvent::TakeoverReleased {
                conversation_id: conversation.id,
                admin_id,
                reason: "inactivity".to_string(),
            });
        }
        Ok(released)
    }

    /// Current owner of a conversation, if any.
    ///
    /// Serves from the in-process cache when possible, falling back to the
    /// store on a miss (e.g. after restart).
    pub async fn owner_of(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<AdminIdentity>, RepositoryError> {
        if let Some(owner) = self.owners.get(&conversation_id) {
            return Ok(Some(AdminIdentity {
                admin_id: owner.admin_id,
                admin_name: owner.admin_name.clone(),
                role: handover_types::message::Role::Admin,
            }));
        }

        let Some(conversation) = self.conversations.get(&conversation_id).await? else {
            return Ok(None);
        };
        match (conversation.owner_admin_id, conversation.owner_admin_name) {
            (Some(admin_id), Some(admin_name)) => {
                self.owners.insert(
                    conversation_id,
                    Owner {
                        admin_id,
                        admin_name: admin_name.clone(),
                    },
                );
                Ok(Some(AdminIdentity {
                    admin_id,
                    admin_name,
                    role: handover_types::message::Role::Admin,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Whether any admin currently owns the conversation.
    pub async fn is_owned(&self, conversation_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.owner_of(conversation_id).await?.is_some())
    }
}

fn storage(error: RepositoryError) -> TakeoverError {
    TakeoverError::Storage(error.to_string())
}
