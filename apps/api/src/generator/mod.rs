//! Content Generator client: the single point of entry for the resume
//! generation webhook.
//!
//! ARCHITECTURAL RULE: no other module may call the webhook directly. The
//! generator is a shared automation endpoint; every call carries the fixed
//! routing tags below and `disableToolUse: true` so it cannot perform
//! unrelated actions on our behalf.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::session::MemoryData;

/// Routing tag identifying the calling surface.
const SOURCE_TAG: &str = "resumeflow-web";
/// Routing tag identifying the request kind.
const TYPE_TAG: &str = "resume-creation";

/// Total attempts for a transient upstream failure.
const MAX_ATTEMPTS: u32 = 3;
/// Fixed delay between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Reply text used when the generator omits `message`.
pub const FALLBACK_REPLY: &str = "I apologize, but I didn't receive a proper response.";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream provider error (status {status}) after {attempts} attempts")]
    Upstream { status: u16, attempts: u32 },

    #[error("generator rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("generator returned a malformed response")]
    Malformed,
}

impl GeneratorError {
    /// Transient failures were already retried; everything else must not be.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeneratorError::Transport(_) | GeneratorError::Upstream { .. }
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    message: &'a str,
    session_id: Uuid,
    user_id: Uuid,
    user_email: &'a str,
    timestamp: String,
    source: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    disable_tool_use: bool,
}

/// One defensively-validated generator turn. Fields the webhook omitted fall
/// back to safe defaults instead of failing the turn.
#[derive(Debug, Clone)]
pub struct GeneratorReply {
    pub message: String,
    pub resume_html: Option<String>,
    pub collected_info: Option<MemoryData>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct GeneratorClient {
    client: reqwest::Client,
    webhook_url: String,
    retry_delay: Duration,
}

impl GeneratorClient {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            webhook_url,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the fixed retry delay (tests).
    #[allow(dead_code)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends one user turn to the webhook. Retries the same request up to
    /// `MAX_ATTEMPTS` times on transient provider errors (connection failure,
    /// 429, 5xx) with a fixed delay; 4xx rejections and malformed bodies are
    /// returned immediately.
    pub async fn send_turn(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
        message: &str,
    ) -> Result<GeneratorReply, GeneratorError> {
        let payload = WebhookPayload {
            message,
            session_id,
            user_id: auth.user_id,
            user_email: &auth.email,
            timestamp: Utc::now().to_rfc3339(),
            source: SOURCE_TAG,
            kind: TYPE_TAG,
            disable_tool_use: true,
        };

        let mut last_error: Option<GeneratorError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                warn!(
                    "generator attempt {} failed, retrying after {}ms",
                    attempt,
                    self.retry_delay.as_millis()
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.webhook_url)
                .bearer_auth(&auth.access_token)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(GeneratorError::Transport(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("generator returned {}: {}", status, body);
                last_error = Some(GeneratorError::Upstream {
                    status: status.as_u16(),
                    attempts: attempt + 1,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GeneratorError::Rejected {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let value: Value = response.json().await.map_err(|e| {
                warn!("generator response was not JSON: {e}");
                GeneratorError::Malformed
            })?;

            debug!("generator replied for session {session_id}");
            return reply_from_value(value);
        }

        Err(last_error.unwrap_or(GeneratorError::Upstream {
            status: 0,
            attempts: MAX_ATTEMPTS,
        }))
    }
}

/// Unwraps an array-wrapped payload to its first element and reads the reply
/// fields with safe defaults. Non-object payloads are malformed.
fn reply_from_value(value: Value) -> Result<GeneratorReply, GeneratorError> {
    let value = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(GeneratorError::Malformed);
            }
            items.remove(0)
        }
        other => other,
    };

    let obj = value.as_object().ok_or(GeneratorError::Malformed)?;

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(FALLBACK_REPLY)
        .to_string();

    let resume_html = obj
        .get("resumeHtml")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let collected_info = obj
        .get("collectedInfo")
        .filter(|c| !c.is_null())
        .and_then(|c| serde_json::from_value(c.clone()).ok());

    let error = obj
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    Ok(GeneratorReply {
        message,
        resume_html,
        collected_info,
        error,
    })
}
