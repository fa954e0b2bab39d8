//! Session Store boundary.
//!
//! The reconciler, controller and export coordinator only ever talk to this
//! trait. `PgSessionStore` is the production adapter; tests run against the
//! in-memory double in `memory.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::download::NewDownload;
use crate::models::message::{ChatMessageRow, Sender};
use crate::models::session::{MemoryData, SessionRow, SessionStatus};
use crate::models::subscription::SubscriptionTier;

pub mod pg;

#[cfg(test)]
pub mod memory;

pub use pg::PgSessionStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Most recently updated `active` session owned by the user, if any.
    async fn latest_active_session(&self, user_id: Uuid) -> StoreResult<Option<SessionRow>>;

    /// Session by public identifier, constrained to the given owner and
    /// `active` status. Missing, foreign and non-active sessions all come
    /// back as `None`; the reconciler treats every `None` as a fallback cue.
    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<SessionRow>>;

    /// Inserts a fresh `active` session with empty memory.
    async fn insert_session(&self, session_id: Uuid, user_id: Uuid) -> StoreResult<SessionRow>;

    /// Updates the session status and bumps `updated_at`.
    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> StoreResult<()>;

    /// Overwrites the memory map (and the dedicated resume column when new
    /// markup is provided), bumping `updated_at`. Last write wins.
    async fn update_memory(
        &self,
        session_id: Uuid,
        memory: &MemoryData,
        resume_html: Option<&str>,
    ) -> StoreResult<()>;

    /// Appends one transcript entry and bumps the session's `updated_at`.
    async fn insert_message(
        &self,
        session_id: Uuid,
        sender: Sender,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ChatMessageRow>;

    /// Full transcript in replay order (created-time ascending).
    async fn messages_for_session(&self, session_id: Uuid) -> StoreResult<Vec<ChatMessageRow>>;

    async fn insert_download(&self, download: NewDownload<'_>) -> StoreResult<()>;

    /// Quota predicate: whether the user may export right now.
    async fn may_download(&self, user_id: Uuid) -> StoreResult<bool>;

    /// Remaining exports this month; `-1` means unlimited.
    async fn remaining_downloads(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Active subscription tier, defaulting to free when no row exists.
    async fn subscription_tier(&self, user_id: Uuid) -> StoreResult<SubscriptionTier>;
}
