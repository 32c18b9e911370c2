use thiserror::Error;
use uuid::Uuid;

/// Errors from takeover arbitration.
#[derive(Debug, Error)]
pub enum TakeoverError {
    #[error("conversation not found")]
    NotFound,

    #[error("conversation already owned by {owner_name}")]
    AlreadyOwned { owner_id: Uuid, owner_name: String },

    #[error("conversation is closed")]
    Closed,

    #[error("you do not own this conversation")]
    NotOwner,

    #[error("admin is already handling the maximum number of conversations")]
    TooManyConversations,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from repository operations (used by trait definitions in
/// handover-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from chat orchestration.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message content must not be empty")]
    EmptyMessage,

    #[error("conversation not found")]
    NotFound,

    #[error("you do not own this conversation")]
    NotOwner,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from learning capture.
#[derive(Debug, Error)]
pub enum LearningError {
    #[error("message not found")]
    MessageNotFound,

    #[error("only automated replies can be corrected")]
    NotAiReply,

    #[error("message was already corrected")]
    AlreadyCorrected,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Malformed or unauthorized input, rejected before any state mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("message content must not be empty")]
    EmptyMessage,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("role '{role}' may not use visibility '{visibility}'")]
    VisibilityNotAllowed { role: String, visibility: String },

    #[error("admin access required")]
    AdminRequired,
}
