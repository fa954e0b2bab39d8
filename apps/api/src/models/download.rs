#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Export format label recorded with every download.
pub const DOWNLOAD_FORMAT: &str = "HTML/PDF";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DownloadRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_name: String,
    pub format: String,
    /// Markup snapshot taken at export time, before watermarking.
    pub resume_html: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a download record. Records are written once per
/// confirmed export and never mutated.
#[derive(Debug, Clone)]
pub struct NewDownload<'a> {
    pub user_id: Uuid,
    pub resume_name: String,
    pub format: &'static str,
    pub resume_html: &'a str,
}

impl<'a> NewDownload<'a> {
    pub fn for_export(user_id: Uuid, resume_html: &'a str, at: DateTime<Utc>) -> Self {
        NewDownload {
            user_id,
            resume_name: format!("Resume {}", at.format("%B %-d, %Y")),
            format: DOWNLOAD_FORMAT,
            resume_html,
        }
    }
}
