use serde::Serialize;
use uuid::Uuid;

use crate::models::message::ChatMessageRow;
use crate::models::session::MemoryData;

/// Local mirror of exactly one persisted session: its ordered transcript,
/// completeness map and last sanitized resume markup. This is the single
/// source of truth the UI renders from; the reconciler replaces it wholesale
/// when the persisted session diverges.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCache {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessageRow>,
    #[serde(rename = "collectedInfo")]
    pub memory: MemoryData,
    pub resume_html: Option<String>,
}

impl SessionCache {
    pub fn empty(session_id: Uuid) -> Self {
        SessionCache {
            session_id,
            messages: Vec::new(),
            memory: MemoryData::default(),
            resume_html: None,
        }
    }

    pub fn progress_percent(&self) -> f64 {
        self.memory.progress_percent()
    }
}
