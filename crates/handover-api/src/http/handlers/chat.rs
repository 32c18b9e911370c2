//! Message ingress HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/chat/messages                      - Customer message ingress
//! - POST /api/v1/conversations/{id}/admin-messages  - Owner reply
//! - POST /api/v1/conversations/{id}/notes           - Internal note

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use handover_core::visibility::{self, MessageView};
use handover_types::admin::AdminIdentity;
use handover_types::conversation::Conversation;
use handover_types::message::{Role, Visibility};

use super::conversation::parse_uuid;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CustomerMessageRequest {
    pub session_key: String,
    pub content: String,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

/// What the customer gets back for one message: their stored message and,
/// when no admin owns the conversation, the automated reply.
#[derive(Debug, Serialize)]
pub struct CustomerTurnResponse {
    pub conversation: Conversation,
    pub user_message: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reply: Option<MessageView>,
}

/// POST /api/v1/chat/messages - Handle an inbound customer message.
///
/// On an unowned conversation the response carries the automated reply;
/// on an owned one the owning admin answers over the WebSocket instead.
pub async fn customer_message(
    State(state): State<AppState>,
    Json(req): Json<CustomerMessageRequest>,
) -> Result<Json<ApiResponse<CustomerTurnResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let turn = state
        .chat_service
        .handle_customer_message(&req.session_key, &req.content, req.customer_id)
        .await?;

    // The ingress endpoint is customer-facing, so project both messages
    // through the customer lens.
    let user_message = visibility::project(&turn.user_message, Role::Customer)
        .ok_or_else(|| AppError::Internal("stored message not visible to sender".to_string()))?;
    let auto_reply = turn
        .auto_reply
        .as_ref()
        .and_then(|m| visibility::project(m, Role::Customer));

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        CustomerTurnResponse {
            conversation: turn.conversation,
            user_message,
            auto_reply,
        },
        request_id,
        elapsed,
    )))
}

#[derive(Debug, Deserialize)]
pub struct AdminMessageRequest {
    pub admin: AdminIdentity,
    pub content: String,
    /// Present the reply to the customer as coming from the assistant.
    #[serde(default)]
    pub appears_as_ai: bool,
}

/// POST /api/v1/conversations/{id}/admin-messages - Reply as the owning
/// admin. Rejected with 403 when the sender does not own the conversation.
pub async fn admin_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdminMessageRequest>,
) -> Result<Json<ApiResponse<MessageView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    let message = state
        .chat_service
        .send_admin_message(conversation_id, &req.admin, &req.content, req.appears_as_ai)
        .await?;

    let view = visibility::project(&message, req.admin.role)
        .ok_or_else(|| AppError::Internal("stored message not visible to sender".to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct InternalNoteRequest {
    pub admin: AdminIdentity,
    pub content: String,
    #[serde(default = "default_note_visibility")]
    pub visibility: Visibility,
}

fn default_note_visibility() -> Visibility {
    Visibility::Internal
}

/// POST /api/v1/conversations/{id}/notes - Attach an internal note.
///
/// Notes never reach customers and do not require ownership. Super-admin
/// visibility is restricted to super admins.
pub async fn internal_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InternalNoteRequest>,
) -> Result<Json<ApiResponse<MessageView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if !req.admin.role.is_admin() {
        return Err(AppError::Validation(
            "internal notes require an admin role".to_string(),
        ));
    }
    if req.visibility == Visibility::Public {
        return Err(AppError::Validation(
            "internal notes cannot be public".to_string(),
        ));
    }
    if req.visibility == Visibility::SuperAdminOnly && req.admin.role != Role::SuperAdmin {
        return Err(AppError::Validation(
            "super admin visibility requires a super admin".to_string(),
        ));
    }

    let conversation_id = parse_uuid(&id)?;
    let note = state
        .chat_service
        .add_internal_note(conversation_id, &req.admin, &req.content, req.visibility)
        .await?;

    let view = visibility::project(&note, req.admin.role)
        .ok_or_else(|| AppError::Internal("stored note not visible to author".to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}
