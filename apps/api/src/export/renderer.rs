//! Renderer boundary client.
//!
//! The render service turns resume markup into a print-ready document:
//! either a full HTML document or a PDF byte stream depending on deployment.
//! The caller must check the content type before use; anything else is a
//! failure, never parsed further.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("resume preview service is not available (status {status})")]
    Unavailable { status: u16 },

    #[error("renderer responded with status {status}")]
    Status { status: u16 },

    #[error("unexpected renderer content type '{0}'")]
    ContentType(String),

    #[error("renderer returned a malformed document")]
    MalformedDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Html,
    Pdf,
}

impl RenderFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            RenderFormat::Html => "text/html",
            RenderFormat::Pdf => "application/pdf",
        }
    }
}

/// A validated render result, safe to hand to the browser as-is.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub format: RenderFormat,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct RendererClient {
    client: reqwest::Client,
    base_url: String,
}

impl RendererClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Probes the render service before an export is attempted.
    pub async fn health_check(&self) -> Result<(), RenderError> {
        let response = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RenderError::Unavailable {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Renders markup to a document, validating status, content type and
    /// (for HTML deployments) the document shape.
    pub async fn preview(&self, html: &str) -> Result<RenderedDocument, RenderError> {
        let response = self
            .client
            .post(format!("{}/api/preview-resume", self.base_url))
            .json(&serde_json::json!({ "html": html }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("renderer returned status {status}");
            return Err(RenderError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let format = if content_type.starts_with("text/html") {
            RenderFormat::Html
        } else if content_type.starts_with("application/pdf") {
            RenderFormat::Pdf
        } else {
            return Err(RenderError::ContentType(content_type));
        };

        let body = response.bytes().await?;

        if format == RenderFormat::Html {
            let text = std::str::from_utf8(&body).map_err(|_| RenderError::MalformedDocument)?;
            if !text.trim_start().to_lowercase().starts_with("<!doctype html") {
                return Err(RenderError::MalformedDocument);
            }
        }

        Ok(RenderedDocument { format, body })
    }
}
