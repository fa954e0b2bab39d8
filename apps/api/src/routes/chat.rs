use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::chat::TurnOutcome;
use crate::errors::AppError;
use crate::models::message::ChatMessageRow;
use crate::models::session::MemoryData;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub session_id: Option<Uuid>,
    /// Persisted assistant reply, when the generator answered.
    pub reply: Option<ChatMessageRow>,
    /// Transient toast-style notice; never part of the transcript.
    pub notice: Option<String>,
    pub collected_info: MemoryData,
    pub resume_html: Option<String>,
    pub progress_percent: f64,
}

/// POST /api/v1/chat/message
/// Runs one conversation turn. Turns are serialized per user: while one is
/// in flight, further submissions are rejected with 409.
pub async fn handle_message(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let controller = state.controller_for(auth.user_id).await;
    let mut guard = controller.try_lock().map_err(|_| AppError::TurnInFlight)?;

    let outcome = guard.submit_turn(&auth, &req.message).await?;
    let (reply, notice) = match outcome {
        TurnOutcome::Ignored => (None, None),
        TurnOutcome::Completed { assistant, notice } => (assistant, notice),
    };

    let cache = guard.cache();
    Ok(Json(TurnResponse {
        session_id: cache.map(|c| c.session_id),
        reply,
        notice,
        collected_info: cache.map(|c| c.memory.clone()).unwrap_or_default(),
        resume_html: cache.and_then(|c| c.resume_html.clone()),
        progress_percent: cache.map(|c| c.progress_percent()).unwrap_or(0.0),
    }))
}
