//! Repository trait definitions.
//!
//! Implementations live in handover-infra (e.g., `SqliteConversationRepository`).
//! All traits use native async fn in traits (RPITIT, Rust 2024 edition).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use handover_types::admin::{AdminSession, AdminStatus};
use handover_types::conversation::{Conversation, ConversationStatus, Priority};
use handover_types::error::RepositoryError;
use handover_types::learning::LearningRecord;
use handover_types::message::Message;
use handover_types::provider::CachedReply;

/// Persistence for conversations and their ownership state.
///
/// Ownership mutations are conditional updates: the store is the single
/// arbiter, and callers learn whether they won from the returned bool.
pub trait ConversationRepository: Send + Sync {
    /// Insert a new conversation.
    fn create(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a conversation by its unique ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Get a conversation by its customer-facing session key.
    fn get_by_session_key(
        &self,
        session_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List conversations by status, most recently active first.
    fn list_by_status(
        &self,
        status: ConversationStatus,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Atomically claim ownership of an unowned conversation.
    ///
    /// Succeeds only if no admin currently owns it. Returns `true` when
    /// this caller won the claim, `false` when another owner already holds
    /// the conversation.
    fn claim_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
        admin_name: &str,
        owned_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Release ownership held by a specific admin.
    ///
    /// Conditional on the caller actually being the owner. Returns `true`
    /// if ownership was released, `false` if the caller did not own it.
    fn release_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Release every conversation whose owner has been idle since before
    /// `cutoff`. Returns the released conversations for event publication.
    fn release_owned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Update conversation status (e.g., escalated, closed).
    fn set_status(
        &self,
        conversation_id: &Uuid,
        status: ConversationStatus,
        priority: Option<Priority>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Record activity without touching the message counters (e.g. a
    /// customer socket going away).
    fn record_activity(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Bump `last_activity` and the message counters.
    fn touch(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
        internal: bool,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Bump the correction counter.
    fn record_correction(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Persistence for messages within a conversation.
pub trait MessageRepository: Send + Sync {
    /// Insert a message.
    fn insert(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a single message by ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Page through a conversation's messages.
    ///
    /// Returns the most recent `limit` messages created strictly before
    /// `before` (the latest page when `before` is None), ordered oldest
    /// first within the page. Older pages are fetched by passing the
    /// first returned message's timestamp as the next cursor.
    fn list_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Annotate a stored message with an admin correction.
    fn mark_corrected(
        &self,
        message_id: &Uuid,
        correction: &str,
        reason: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Presence registry for admin operators.
pub trait AdminSessionRepository: Send + Sync {
    /// Insert or refresh an admin session (keyed by admin_id).
    fn upsert(
        &self,
        session: &AdminSession,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        admin_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AdminSession>, RepositoryError>> + Send;

    /// All admins currently marked online.
    fn list_online(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<AdminSession>, RepositoryError>> + Send;

    fn set_status(
        &self,
        admin_id: &Uuid,
        status: AdminStatus,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Number of conversations currently owned by this admin.
    fn owned_count(
        &self,
        admin_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}

/// Persistence for captured admin corrections.
pub trait LearningRepository: Send + Sync {
    fn insert(
        &self,
        record: &LearningRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Records not yet folded into training, oldest first.
    fn list_pending(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<LearningRecord>, RepositoryError>> + Send;

    /// Flag a record as folded into training, removing it from the
    /// pending set.
    fn mark_applied(
        &self,
        record_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}

/// Durable cache of provider replies keyed by normalized prompt.
pub trait ReplyCacheRepository: Send + Sync {
    /// Look up a cached reply. Implementations must not return expired
    /// entries.
    fn get(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<CachedReply>, RepositoryError>> + Send;

    /// Store (or overwrite) a cached reply.
    fn put(
        &self,
        reply: &CachedReply,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Bump the hit counter for a served entry.
    fn record_hit(
        &self,
        cache_key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete expired entries. Returns how many were removed.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
