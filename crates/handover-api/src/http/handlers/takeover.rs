//! Ownership arbitration HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/conversations/{id}/takeover - Claim ownership
//! - POST /api/v1/conversations/{id}/release  - Return to the assistant
//!
//! The store is the arbiter: with any number of concurrent takeover
//! requests exactly one caller gets 200, the rest get 409 naming the
//! winner.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use handover_types::admin::AdminIdentity;
use handover_types::conversation::Conversation;

use super::conversation::parse_uuid;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TakeoverRequest {
    pub admin: AdminIdentity,
}

/// POST /api/v1/conversations/{id}/takeover - Claim ownership for an admin.
pub async fn request_takeover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TakeoverRequest>,
) -> Result<Json<ApiResponse<Conversation>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if !req.admin.role.is_admin() {
        return Err(AppError::Validation(
            "takeover requires an admin role".to_string(),
        ));
    }

    let conversation_id = parse_uuid(&id)?;
    let conversation = state
        .arbitrator
        .request_takeover(conversation_id, &req.admin)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(conversation, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub admin_id: Uuid,
}

/// POST /api/v1/conversations/{id}/release - Release ownership held by
/// the calling admin.
pub async fn release_takeover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation_id = parse_uuid(&id)?;
    state
        .arbitrator
        .release(conversation_id, req.admin_id)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({"released": true}),
        request_id,
        elapsed,
    )))
}
