//! Conversation lifecycle HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/conversations                - Open (or resume) a conversation
//! - GET  /api/v1/conversations                - List conversations by status
//! - GET  /api/v1/conversations/{id}           - Get a single conversation
//! - GET  /api/v1/conversations/{id}/messages  - Paged, role-scoped history
//! - POST /api/v1/conversations/{id}/escalate  - Escalate for priority handling
//! - POST /api/v1/conversations/{id}/close     - Close a conversation

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use handover_core::visibility::MessageView;
use handover_types::admin::AdminIdentity;
use handover_types::conversation::{Conversation, ConversationStatus, Priority};
use handover_types::message::Role;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid
/// format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub session_key: String,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

/// POST /api/v1/conversations - Open or resume the conversation for a
/// customer session key.
pub async fn open_conversation(
    State(state): State<AppState>,
    Json(req): Json<OpenConversationRequest>,
) -> Result<Json<ApiResponse<Conversation>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if req.session_key.trim().is_empty() {
        return Err(AppError::Validation(
            "session_key must not be empty".to_string(),
        ));
    }

    let conversation = state
        .chat_service
        .open_conversation(&req.session_key, req.customer_id)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(conversation, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct ConversationListQuery {
    #[serde(default = "default_status")]
    pub status: ConversationStatus,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_status() -> ConversationStatus {
    ConversationStatus::Active
}

fn default_limit() -> i64 {
    50
}

/// GET /api/v1/conversations - List conversations by status.
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<ApiResponse<Vec<Conversation>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversations = state
        .chat_service
        .list_by_status(query.status, query.limit, query.offset)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(conversations, request_id, elapsed)))
}

/// GET /api/v1/conversations/{id} - Get a conversation by ID.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Conversation>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    let conversation = state
        .chat_service
        .get_conversation(conversation_id)
        .await?
        .ok_or(AppError::Chat(handover_types::error::ChatError::NotFound))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(conversation, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Role the page is projected for. Defaults to the customer view.
    #[serde(default)]
    pub viewer: Option<Role>,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
    /// Cursor: only messages created strictly before this instant.
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

fn default_history_limit() -> i64 {
    50
}

/// GET /api/v1/conversations/{id}/messages - Paged history projected for
/// one viewer role. Internal notes and moderation fields never reach
/// non-admin viewers.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<MessageView>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    let viewer = query.viewer.unwrap_or(Role::Customer);

    let page = state
        .chat_service
        .history(conversation_id, viewer, query.limit, query.before)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(page, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub priority: Priority,
    pub admin: AdminIdentity,
}

/// POST /api/v1/conversations/{id}/escalate - Escalate for priority
/// handling.
pub async fn escalate_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EscalateRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    state
        .chat_service
        .escalate(conversation_id, req.priority, &req.admin)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({"escalated": true, "priority": req.priority}),
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/conversations/{id}/close - Close a conversation.
pub async fn close_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    state.chat_service.close(conversation_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({"closed": true}),
        request_id,
        elapsed,
    )))
}
