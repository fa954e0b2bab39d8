#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a chat session. Exactly zero or one `Active` session may
/// exist per user at any time; the reconciler enforces this, not the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Completed => "completed",
        }
    }
}

/// One slot of the completeness map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotState {
    pub collected: bool,
    pub data: Option<Value>,
}

/// The four-slot completeness map the generator fills in as the conversation
/// progresses. The latest resume markup is embedded here as well, redundantly
/// with the dedicated `resume_html` column on the session row.
///
/// Deserialization is lenient: unknown fields are dropped and missing slots
/// default to uncollected, so a malformed map can never fail a restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryData {
    pub personal_info: SlotState,
    pub education: SlotState,
    pub experience: SlotState,
    pub skills: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_html: Option<String>,
}

impl MemoryData {
    pub fn collected_count(&self) -> usize {
        [
            &self.personal_info,
            &self.education,
            &self.experience,
            &self.skills,
        ]
        .iter()
        .filter(|slot| slot.collected)
        .count()
    }

    /// Completion percentage across the four fixed slots.
    pub fn progress_percent(&self) -> f64 {
        (self.collected_count() as f64 / 4.0) * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    /// Public opaque identifier handed to clients; distinct from the row pk.
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub memory_data: Option<Value>,
    pub resume_html: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRow {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active.as_str()
    }

    /// Parses the persisted memory map, falling back to an empty map when the
    /// column is null or holds something unreadable.
    pub fn memory(&self) -> MemoryData {
        self.memory_data
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}
