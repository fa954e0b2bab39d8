use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/export
/// Renders the current resume and streams the document back with the
/// renderer's content type. Shares the per-user busy flag with chat turns.
pub async fn handle_export(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Response, AppError> {
    let controller = state.controller_for(auth.user_id).await;
    let mut guard = controller.try_lock().map_err(|_| AppError::TurnInFlight)?;
    guard.ensure_session(&auth).await?;

    let markup = guard
        .cache()
        .and_then(|c| c.resume_html.clone())
        .unwrap_or_default();

    let outcome = state.exporter.request_export(&auth, &markup).await?;
    let remaining = outcome.remaining.to_string();

    Ok((
        [
            ("content-type", outcome.document.format.content_type()),
            ("x-remaining-downloads", remaining.as_str()),
        ],
        outcome.document.body,
    )
        .into_response())
}

/// GET /api/v1/export/remaining
/// Remaining-quota counter for the signed-in user; `-1` means unlimited.
pub async fn handle_remaining(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<serde_json::Value>, AppError> {
    let remaining = state.store.remaining_downloads(auth.user_id).await?;
    Ok(Json(json!({ "remaining": remaining })))
}
