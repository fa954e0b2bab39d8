use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::download::NewDownload;
use crate::models::message::{ChatMessageRow, Sender};
use crate::models::session::{MemoryData, SessionRow, SessionStatus};
use crate::models::subscription::{
    SubscriptionTier, FREE_MONTHLY_DOWNLOAD_LIMIT, UNLIMITED_DOWNLOADS,
};
use crate::store::{SessionStore, StoreError, StoreResult};

/// Postgres adapter for the Session Store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Downloads recorded for the user in the current calendar month.
    async fn downloads_this_month(&self, user_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM downloads
            WHERE user_id = $1 AND created_at >= date_trunc('month', now())
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn latest_active_session(&self, user_id: Uuid) -> StoreResult<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM chat_sessions
            WHERE user_id = $1 AND status = 'active'
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM chat_sessions
            WHERE session_id = $1 AND user_id = $2 AND status = 'active'
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_session(&self, session_id: Uuid, user_id: Uuid) -> StoreResult<SessionRow> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO chat_sessions (id, session_id, user_id, status, memory_data)
            VALUES ($1, $2, $3, 'active', NULL)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_status(&self, session_id: Uuid, status: SessionStatus) -> StoreResult<()> {
        sqlx::query(
            "UPDATE chat_sessions SET status = $2, updated_at = now() WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_memory(
        &self,
        session_id: Uuid,
        memory: &MemoryData,
        resume_html: Option<&str>,
    ) -> StoreResult<()> {
        let memory_value = serde_json::to_value(memory)
            .map_err(|e| StoreError::Unavailable(format!("memory serialization failed: {e}")))?;
        sqlx::query(
            r#"
            UPDATE chat_sessions
            SET memory_data = $2,
                resume_html = COALESCE($3, resume_html),
                updated_at = now()
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .bind(memory_value)
        .bind(resume_html)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: Uuid,
        sender: Sender,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ChatMessageRow> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages (id, session_id, sender, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(sender.as_str())
        .bind(content)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        // Every transcript append bumps the owning session.
        sqlx::query("UPDATE chat_sessions SET updated_at = now() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(row)
    }

    async fn messages_for_session(&self, session_id: Uuid) -> StoreResult<Vec<ChatMessageRow>> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            SELECT * FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_download(&self, download: NewDownload<'_>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO downloads (id, user_id, resume_name, format, resume_html)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(download.user_id)
        .bind(&download.resume_name)
        .bind(download.format)
        .bind(download.resume_html)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn may_download(&self, user_id: Uuid) -> StoreResult<bool> {
        if !self.subscription_tier(user_id).await?.is_free() {
            return Ok(true);
        }
        Ok(self.downloads_this_month(user_id).await? < FREE_MONTHLY_DOWNLOAD_LIMIT)
    }

    async fn remaining_downloads(&self, user_id: Uuid) -> StoreResult<i64> {
        if !self.subscription_tier(user_id).await?.is_free() {
            return Ok(UNLIMITED_DOWNLOADS);
        }
        let used = self.downloads_this_month(user_id).await?;
        Ok((FREE_MONTHLY_DOWNLOAD_LIMIT - used).max(0))
    }

    async fn subscription_tier(&self, user_id: Uuid) -> StoreResult<SubscriptionTier> {
        let tier: Option<String> = sqlx::query_scalar(
            "SELECT tier FROM subscriptions WHERE user_id = $1 AND active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tier
            .and_then(|t| t.parse().ok())
            .unwrap_or(SubscriptionTier::Free))
    }
}
