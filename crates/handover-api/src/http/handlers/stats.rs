//! Service statistics endpoint.
//!
//! GET /api/v1/stats - Aggregate counts plus responder health.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use sqlx::Row;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/stats - Conversation counts, responder metrics, breaker
/// state, learning backlog, and live connection counts.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    // Conversation counts by status (single query with conditional counts)
    let conversation_row = sqlx::query(
        r#"SELECT
            COUNT(*) as total,
            SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END) as active,
            SUM(CASE WHEN status = 'admin_taken' THEN 1 ELSE 0 END) as admin_taken,
            SUM(CASE WHEN status = 'escalated' THEN 1 ELSE 0 END) as escalated,
            SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END) as closed,
            SUM(CASE WHEN owner_admin_id IS NOT NULL THEN 1 ELSE 0 END) as owned
        FROM conversations"#,
    )
    .fetch_one(&state.db_pool.reader)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to query conversation stats: {e}")))?;

    let total: i64 = conversation_row.try_get("total").unwrap_or(0);
    let active: i64 = conversation_row.try_get("active").unwrap_or(0);
    let admin_taken: i64 = conversation_row.try_get("admin_taken").unwrap_or(0);
    let escalated: i64 = conversation_row.try_get("escalated").unwrap_or(0);
    let closed: i64 = conversation_row.try_get("closed").unwrap_or(0);
    let owned: i64 = conversation_row.try_get("owned").unwrap_or(0);

    let message_row = sqlx::query("SELECT COUNT(*) as cnt FROM messages")
        .fetch_one(&state.db_pool.reader)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to query message stats: {e}")))?;
    let total_messages: i64 = message_row.try_get("cnt").unwrap_or(0);

    let learning_row = sqlx::query("SELECT COUNT(*) as cnt FROM learning_records")
        .fetch_one(&state.db_pool.reader)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to query learning stats: {e}")))?;
    let learning_records: i64 = learning_row.try_get("cnt").unwrap_or(0);

    let metrics = state.chat_service.responder().metrics_snapshot();
    let breaker = state.chat_service.responder().breaker_snapshot().await;

    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({
        "conversations": {
            "total": total,
            "active": active,
            "admin_taken": admin_taken,
            "escalated": escalated,
            "closed": closed,
            "owned": owned,
        },
        "total_messages": total_messages,
        "learning_records": learning_records,
        "responder": metrics,
        "breaker": breaker,
        "connected_sockets": state.registry.connected(),
    });

    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}
