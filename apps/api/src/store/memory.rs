//! In-memory Session Store used by the reconciler/controller/export tests.
//! Mirrors the Postgres adapter's observable behavior, including the
//! updated-time bumps, and can simulate an outage via `set_unavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::download::{DownloadRow, NewDownload};
use crate::models::message::{ChatMessageRow, Sender};
use crate::models::session::{MemoryData, SessionRow, SessionStatus};
use crate::models::subscription::{
    SubscriptionTier, FREE_MONTHLY_DOWNLOAD_LIMIT, UNLIMITED_DOWNLOADS,
};
use crate::store::{SessionStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    sessions: Vec<SessionRow>,
    messages: Vec<ChatMessageRow>,
    downloads: Vec<DownloadRow>,
    tiers: HashMap<Uuid, SubscriptionTier>,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    pub fn set_tier(&self, user_id: Uuid, tier: SubscriptionTier) {
        self.inner.lock().unwrap().tiers.insert(user_id, tier);
    }

    pub fn session(&self, session_id: Uuid) -> Option<SessionRow> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
    }

    pub fn sessions_for_user(&self, user_id: Uuid) -> Vec<SessionRow> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn active_session_count(&self, user_id: Uuid) -> usize {
        self.sessions_for_user(user_id)
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    pub fn downloads_for_user(&self, user_id: Uuid) -> Vec<DownloadRow> {
        self.inner
            .lock()
            .unwrap()
            .downloads
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect()
    }

    fn check_available(inner: &Inner) -> StoreResult<()> {
        if inner.unavailable {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn latest_active_session(&self, user_id: Uuid) -> StoreResult<Option<SessionRow>> {
        let inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        Ok(inner
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.user_id == user_id && s.is_active())
            .max_by_key(|(idx, s)| (s.updated_at, *idx))
            .map(|(_, s)| s.clone()))
    }

    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<SessionRow>> {
        let inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        Ok(inner
            .sessions
            .iter()
            .find(|s| s.session_id == session_id && s.user_id == user_id && s.is_active())
            .cloned())
    }

    async fn insert_session(&self, session_id: Uuid, user_id: Uuid) -> StoreResult<SessionRow> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        let now = Utc::now();
        let row = SessionRow {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            status: SessionStatus::Active.as_str().to_string(),
            memory_data: None,
            resume_html: None,
            created_at: now,
            updated_at: now,
        };
        inner.sessions.push(row.clone());
        Ok(row)
    }

    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        if let Some(row) = inner
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            row.status = status.as_str().to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_memory(
        &self,
        session_id: Uuid,
        memory: &MemoryData,
        resume_html: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        if let Some(row) = inner
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            row.memory_data = Some(serde_json::to_value(memory).expect("memory serializes"));
            if let Some(html) = resume_html {
                row.resume_html = Some(html.to_string());
            }
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: Uuid,
        sender: Sender,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ChatMessageRow> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        let row = ChatMessageRow {
            id: Uuid::new_v4(),
            session_id,
            sender: sender.as_str().to_string(),
            content: content.to_string(),
            created_at,
        };
        inner.messages.push(row.clone());
        if let Some(session) = inner
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            session.updated_at = Utc::now();
        }
        Ok(row)
    }

    async fn messages_for_session(&self, session_id: Uuid) -> StoreResult<Vec<ChatMessageRow>> {
        let inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        let mut rows: Vec<ChatMessageRow> = inner
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn insert_download(&self, download: NewDownload<'_>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        let row = DownloadRow {
            id: Uuid::new_v4(),
            user_id: download.user_id,
            resume_name: download.resume_name,
            format: download.format.to_string(),
            resume_html: download.resume_html.to_string(),
            created_at: Utc::now(),
        };
        inner.downloads.push(row);
        Ok(())
    }

    async fn may_download(&self, user_id: Uuid) -> StoreResult<bool> {
        if !self.subscription_tier(user_id).await?.is_free() {
            return Ok(true);
        }
        let inner = self.inner.lock().unwrap();
        let used = inner
            .downloads
            .iter()
            .filter(|d| d.user_id == user_id)
            .count() as i64;
        Ok(used < FREE_MONTHLY_DOWNLOAD_LIMIT)
    }

    async fn remaining_downloads(&self, user_id: Uuid) -> StoreResult<i64> {
        if !self.subscription_tier(user_id).await?.is_free() {
            return Ok(UNLIMITED_DOWNLOADS);
        }
        let inner = self.inner.lock().unwrap();
        let used = inner
            .downloads
            .iter()
            .filter(|d| d.user_id == user_id)
            .count() as i64;
        Ok((FREE_MONTHLY_DOWNLOAD_LIMIT - used).max(0))
    }

    async fn subscription_tier(&self, user_id: Uuid) -> StoreResult<SubscriptionTier> {
        let inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        Ok(inner
            .tiers
            .get(&user_id)
            .copied()
            .unwrap_or(SubscriptionTier::Free))
    }
}
