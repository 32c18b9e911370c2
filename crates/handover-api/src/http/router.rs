//! Axum router configuration with middleware.
//!
//! All REST routes are under `/api/v1/`; the WebSocket lives at
//! `/ws/chat`. Middleware: CORS, tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Conversations
        .route(
            "/conversations",
            post(handlers::conversation::open_conversation)
                .get(handlers::conversation::list_conversations),
        )
        .route(
            "/conversations/{id}",
            get(handlers::conversation::get_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation::get_history),
        )
        .route(
            "/conversations/{id}/escalate",
            post(handlers::conversation::escalate_conversation),
        )
        .route(
            "/conversations/{id}/close",
            post(handlers::conversation::close_conversation),
        )
        // Ownership
        .route(
            "/conversations/{id}/takeover",
            post(handlers::takeover::request_takeover),
        )
        .route(
            "/conversations/{id}/release",
            post(handlers::takeover::release_takeover),
        )
        // Messages
        .route("/chat/messages", post(handlers::chat::customer_message))
        .route(
            "/conversations/{id}/admin-messages",
            post(handlers::chat::admin_message),
        )
        .route(
            "/conversations/{id}/notes",
            post(handlers::chat::internal_note),
        )
        // Corrections
        .route("/corrections", post(handlers::learning::correct_message))
        // Admin presence
        .route("/admins/join", post(handlers::admin::join))
        .route("/admins/{id}/status", post(handlers::admin::set_status))
        .route("/admins/online", get(handlers::admin::list_online))
        // Service stats
        .route("/stats", get(handlers::stats::get_stats));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws/chat", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
