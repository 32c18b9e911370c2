//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use handover_core::learning::CorrectionError;
use handover_types::error::{ChatError, LearningError, TakeoverError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat orchestration errors.
    Chat(ChatError),
    /// Ownership arbitration errors.
    Takeover(TakeoverError),
    /// Correction capture errors.
    Learning(LearningError),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<TakeoverError> for AppError {
    fn from(e: TakeoverError) -> Self {
        AppError::Takeover(e)
    }
}

impl From<LearningError> for AppError {
    fn from(e: LearningError) -> Self {
        AppError::Learning(e)
    }
}

impl From<CorrectionError> for AppError {
    fn from(e: CorrectionError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Chat(ChatError::EmptyMessage) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Message content must not be empty".to_string(),
            ),
            AppError::Chat(ChatError::NotFound) => (
                StatusCode::NOT_FOUND,
                "CONVERSATION_NOT_FOUND",
                "Conversation not found".to_string(),
            ),
            AppError::Chat(ChatError::NotOwner) => (
                StatusCode::FORBIDDEN,
                "NOT_OWNER",
                "Only the owning admin may reply on this conversation".to_string(),
            ),
            AppError::Chat(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CHAT_ERROR",
                e.to_string(),
            ),
            AppError::Takeover(TakeoverError::NotFound) => (
                StatusCode::NOT_FOUND,
                "CONVERSATION_NOT_FOUND",
                "Conversation not found".to_string(),
            ),
            AppError::Takeover(TakeoverError::AlreadyOwned { owner_name, .. }) => (
                StatusCode::CONFLICT,
                "ALREADY_OWNED",
                format!("Conversation is already handled by {owner_name}"),
            ),
            AppError::Takeover(TakeoverError::Closed) => (
                StatusCode::CONFLICT,
                "CONVERSATION_CLOSED",
                "Conversation is closed".to_string(),
            ),
            AppError::Takeover(TakeoverError::NotOwner) => (
                StatusCode::FORBIDDEN,
                "NOT_OWNER",
                "Caller does not own this conversation".to_string(),
            ),
            AppError::Takeover(TakeoverError::TooManyConversations) => (
                StatusCode::CONFLICT,
                "TOO_MANY_CONVERSATIONS",
                "Admin already owns the maximum number of conversations".to_string(),
            ),
            AppError::Takeover(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TAKEOVER_ERROR",
                e.to_string(),
            ),
            AppError::Learning(LearningError::MessageNotFound) => (
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "Message not found".to_string(),
            ),
            AppError::Learning(LearningError::NotAiReply) => (
                StatusCode::BAD_REQUEST,
                "NOT_AI_REPLY",
                "Only automated replies can be corrected".to_string(),
            ),
            AppError::Learning(LearningError::AlreadyCorrected) => (
                StatusCode::CONFLICT,
                "ALREADY_CORRECTED",
                "Message has already been corrected".to_string(),
            ),
            AppError::Learning(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "LEARNING_ERROR",
                e.to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
