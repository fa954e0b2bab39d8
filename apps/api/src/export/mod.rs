//! Export Coordinator: gates and records resume export without owning
//! rendering.
//!
//! Order matters here: the quota predicate runs before any render call, the
//! watermark goes in before the markup leaves the process, and the download
//! record is written only after the renderer confirmed a well-formed
//! document. A failed render never consumes quota.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::models::download::NewDownload;
use crate::store::SessionStore;

pub mod renderer;

pub use renderer::{RenderError, RenderFormat, RenderedDocument, RendererClient};

/// Fixed fragment injected into free-tier exports, immediately before the
/// closing document tag.
pub const WATERMARK_FRAGMENT: &str = "<div style=\"position: fixed; bottom: 20px; \
right: 20px; background: rgba(0,0,0,0.1); padding: 8px 12px; border-radius: 4px; \
font-size: 12px; color: #666; z-index: 1000;\">Created with Resumeflow - upgrade \
to remove this watermark</div>";

/// Pure string transform: the markup is opaque at this point, so the
/// watermark is spliced in front of the first `</body>`, not via any DOM
/// work. Markup without a closing document tag passes through unchanged.
pub fn inject_watermark(html: &str) -> String {
    html.replacen("</body>", &format!("{WATERMARK_FRAGMENT}</body>"), 1)
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub document: RenderedDocument,
    /// Refreshed remaining-quota counter; `-1` means unlimited.
    pub remaining: i64,
}

#[derive(Clone)]
pub struct ExportCoordinator {
    store: Arc<dyn SessionStore>,
    renderer: RendererClient,
}

impl ExportCoordinator {
    pub fn new(store: Arc<dyn SessionStore>, renderer: RendererClient) -> Self {
        ExportCoordinator { store, renderer }
    }

    /// Renders the given resume markup and records the download.
    ///
    /// The recorded snapshot is the markup as chatted, without the watermark.
    pub async fn request_export(
        &self,
        auth: &AuthContext,
        markup: &str,
    ) -> Result<ExportOutcome, AppError> {
        if markup.trim().is_empty() {
            return Err(AppError::Validation(
                "No resume to export yet. Complete the conversation to generate one first."
                    .to_string(),
            ));
        }

        if !self.store.may_download(auth.user_id).await? {
            return Err(AppError::QuotaExhausted);
        }

        self.renderer.health_check().await.map_err(|e| {
            AppError::Renderer(format!(
                "Could not connect to the resume preview service: {e}"
            ))
        })?;

        // Subscription lookups fail open to the free tier.
        let tier = self
            .store
            .subscription_tier(auth.user_id)
            .await
            .unwrap_or_default();

        let html_to_send = if tier.is_free() {
            inject_watermark(markup)
        } else {
            markup.to_string()
        };

        let document = self
            .renderer
            .preview(&html_to_send)
            .await
            .map_err(|e| AppError::Renderer(e.to_string()))?;

        self.store
            .insert_download(NewDownload::for_export(auth.user_id, markup, Utc::now()))
            .await?;

        let remaining = self.store.remaining_downloads(auth.user_id).await?;
        info!(
            "recorded export for user {} ({} remaining)",
            auth.user_id, remaining
        );

        Ok(ExportOutcome {
            document,
            remaining,
        })
    }
}
