pub mod chat;
pub mod export;
pub mod health;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session lifecycle (mount, tab focus, unload, explicit reset)
        .route("/api/v1/session/restore", post(session::handle_restore))
        .route("/api/v1/session/visibility", post(session::handle_visibility))
        .route("/api/v1/session/unload", post(session::handle_unload))
        .route("/api/v1/session/reset", post(session::handle_reset))
        // Conversation
        .route("/api/v1/chat/message", post(chat::handle_message))
        // Export
        .route("/api/v1/export", post(export::handle_export))
        .route("/api/v1/export/remaining", get(export::handle_remaining))
        .with_state(state)
}
