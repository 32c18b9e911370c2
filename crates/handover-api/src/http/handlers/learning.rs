//! Correction capture HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/corrections - Correct an automated reply

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use handover_core::learning::Correction;
use handover_core::visibility::{self, MessageView};
use handover_types::admin::AdminIdentity;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub message_id: Uuid,
    pub corrected_text: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub admin: AdminIdentity,
}

/// POST /api/v1/corrections - Apply an admin correction to an automated
/// reply. The original stays in history annotated; the replacement is
/// appended and presented to the customer as an assistant reply.
pub async fn correct_message(
    State(state): State<AppState>,
    Json(req): Json<CorrectionRequest>,
) -> Result<Json<ApiResponse<MessageView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if !req.admin.role.is_admin() {
        return Err(AppError::Validation(
            "corrections require an admin role".to_string(),
        ));
    }

    let mut correction = Correction::new(req.message_id, req.corrected_text)?;
    correction.reason = req.reason;
    correction.category = req.category;

    let replacement = state.learning.capture(correction, &req.admin).await?;

    let view = visibility::project(&replacement, req.admin.role).ok_or_else(|| {
        AppError::Internal("replacement message not visible to author".to_string())
    })?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}
