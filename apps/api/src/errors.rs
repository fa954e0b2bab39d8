#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("A previous turn is still in flight")]
    TurnInFlight,

    #[error("Download limit reached")]
    QuotaExhausted,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Please sign in to continue".to_string(),
            ),
            AppError::TurnInFlight => (
                StatusCode::CONFLICT,
                "TURN_IN_FLIGHT",
                "A previous message is still being processed".to_string(),
            ),
            AppError::QuotaExhausted => (
                StatusCode::FORBIDDEN,
                "QUOTA_EXHAUSTED",
                "You've used all your downloads for this month. Upgrade to premium for unlimited exports.".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Session store error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "We couldn't reach the session store. Your conversation is unchanged. Please retry.".to_string(),
                )
            }
            AppError::Generator(msg) => {
                tracing::error!("Generator error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATOR_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Renderer(msg) => {
                tracing::error!("Renderer error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "RENDERER_ERROR",
                    msg.clone(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
