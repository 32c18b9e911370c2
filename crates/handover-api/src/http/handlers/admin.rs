//! Admin presence HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/admins/join        - Register or refresh an admin session
//! - POST /api/v1/admins/{id}/status - Update presence status
//! - GET  /api/v1/admins/online      - Admins currently online
//!
//! Identity arrives already validated by the upstream identity service;
//! this layer stores it as-is.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use handover_core::repository::AdminSessionRepository;
use handover_types::admin::{AdminIdentity, AdminSession, AdminStatus};

use super::conversation::parse_uuid;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub admin: AdminIdentity,
}

/// POST /api/v1/admins/join - Register or refresh an admin session.
pub async fn join(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<ApiResponse<AdminSession>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if !req.admin.role.is_admin() {
        return Err(AppError::Validation(
            "join requires an admin role".to_string(),
        ));
    }

    let session = AdminSession::online(
        req.admin.admin_id,
        req.admin.admin_name.clone(),
        req.admin.role,
    );
    state
        .admin_sessions
        .upsert(&session)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(session, request_id, elapsed)))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AdminStatus,
}

/// POST /api/v1/admins/{id}/status - Update an admin's presence status.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let admin_id = parse_uuid(&id)?;
    state
        .admin_sessions
        .set_status(&admin_id, req.status, Utc::now())
        .await
        .map_err(|e| match e {
            handover_types::error::RepositoryError::NotFound => {
                AppError::Validation("unknown admin".to_string())
            }
            other => AppError::Internal(other.to_string()),
        })?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({"status": req.status}),
        request_id,
        elapsed,
    )))
}

/// GET /api/v1/admins/online - Admins currently marked online.
pub async fn list_online(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AdminSession>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let admins = state
        .admin_sessions
        .list_online()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(admins, request_id, elapsed)))
}
