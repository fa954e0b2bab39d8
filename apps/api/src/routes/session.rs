use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::models::message::ChatMessageRow;
use crate::models::session::MemoryData;
use crate::session::SessionCache;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleRequest {
    /// The session pointer the browser kept from a prior page view, if any.
    pub remembered_session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessageRow>,
    pub collected_info: MemoryData,
    pub resume_html: Option<String>,
    pub progress_percent: f64,
}

impl SessionSnapshot {
    pub fn from_cache(cache: &SessionCache) -> Self {
        SessionSnapshot {
            session_id: cache.session_id,
            messages: cache.messages.clone(),
            collected_info: cache.memory.clone(),
            resume_html: cache.resume_html.clone(),
            progress_percent: cache.progress_percent(),
        }
    }
}

/// POST /api/v1/session/restore
/// Primary entry point on mount: verifies a remembered pointer or adopts /
/// creates the user's single active session.
pub async fn handle_restore(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<LifecycleRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let controller = state.controller_for(auth.user_id).await;
    let mut guard = controller.lock().await;
    if let Some(id) = req.remembered_session_id {
        guard.reconciler_mut().remember(id);
    }
    let cache = guard.reconciler_mut().restore_or_create(&auth).await?;
    Ok(Json(SessionSnapshot::from_cache(cache)))
}

/// POST /api/v1/session/visibility
/// Invoked when the tab regains foreground visibility. Replaces the cache
/// wholesale when another tab moved the session pointer.
pub async fn handle_visibility(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<LifecycleRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let controller = state.controller_for(auth.user_id).await;
    let mut guard = controller.lock().await;
    if let Some(id) = req.remembered_session_id {
        guard.reconciler_mut().remember(id);
    }
    let cache = if guard.cache().is_none() {
        guard.reconciler_mut().restore_or_create(&auth).await?
    } else {
        guard
            .reconciler_mut()
            .reconcile_on_visibility_change(&auth)
            .await?;
        guard.cache().expect("cache present after reconcile")
    };
    Ok(Json(SessionSnapshot::from_cache(cache)))
}

/// POST /api/v1/session/unload
/// Best-effort beacon fired on page unload. Always 204; failures are logged
/// server-side and must never block navigation.
pub async fn handle_unload(State(state): State<AppState>, auth: AuthContext) -> StatusCode {
    let controller = state.controller_for(auth.user_id).await;
    let guard = controller.lock().await;
    guard.reconciler().mark_inactive_on_unload().await;
    StatusCode::NO_CONTENT
}

/// POST /api/v1/session/reset
/// Completes the current session (terminal for that identifier) and starts a
/// fresh active one.
pub async fn handle_reset(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<SessionSnapshot>, AppError> {
    let controller = state.controller_for(auth.user_id).await;
    let mut guard = controller.lock().await;
    let cache = guard.reconciler_mut().complete_and_start_over(&auth).await?;
    Ok(Json(SessionSnapshot::from_cache(cache)))
}
