//! Session reconciliation.
//!
//! Guarantees that after any page load, tab re-focus or explicit reset the
//! client ends up with exactly one coherent `SessionCache` backed by at most
//! one `active` session row per user. The store does not enforce the
//! single-active invariant transactionally; this module does, by always
//! adopting the most recently updated active session before minting a new
//! identifier.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::message::{ChatMessageRow, Sender};
use crate::models::session::{MemoryData, SessionRow, SessionStatus};
use crate::sanitize::sanitize_html;
use crate::session::cache::SessionCache;
use crate::store::{SessionStore, StoreResult};

/// Deterministic first assistant message, persisted exactly once per session
/// so that reloads are idempotent.
pub const WELCOME_MESSAGE: &str = "👋 Hi! I'm Remy, your AI resume assistant. \
Say a quick hello or pick one of the options below, and together we'll craft \
a resume you're proud of.";

pub struct SessionReconciler {
    store: Arc<dyn SessionStore>,
    /// Short-lived client-side pointer to the last session, best-effort:
    /// it may survive a crash or be cleared at any time, so it is only ever
    /// a hint, never trusted without `verify_and_restore`.
    remembered: Option<Uuid>,
    cache: Option<SessionCache>,
}

impl SessionReconciler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionReconciler {
            store,
            remembered: None,
            cache: None,
        }
    }

    pub fn cache(&self) -> Option<&SessionCache> {
        self.cache.as_ref()
    }

    #[allow(dead_code)]
    pub fn remembered(&self) -> Option<Uuid> {
        self.remembered
    }

    /// Restores the pointer a prior page view left behind.
    pub fn remember(&mut self, session_id: Uuid) {
        self.remembered = Some(session_id);
    }

    /// Primary entry point, invoked on mount and after auth changes.
    ///
    /// Postcondition on success: `remembered` names the `active` session the
    /// cache mirrors, owned by the calling user. On store failure the prior
    /// in-memory cache is left untouched so the UI keeps rendering it.
    pub async fn restore_or_create(&mut self, auth: &AuthContext) -> StoreResult<&SessionCache> {
        match self.remembered {
            Some(id) => self.verify_and_restore(id, auth).await,
            None => self.adopt_or_create(auth).await,
        }
    }

    /// Validates a remembered identifier and rebuilds the cache from it.
    /// A missing, foreign-owned or non-active row is not an error: the
    /// pointer is best-effort, so every dead end falls back to adoption or
    /// creation rather than blocking the user.
    async fn verify_and_restore(
        &mut self,
        session_id: Uuid,
        auth: &AuthContext,
    ) -> StoreResult<&SessionCache> {
        match self.store.find_active_session(session_id, auth.user_id).await {
            Ok(Some(row)) => self.load_session(row).await,
            Ok(None) => {
                info!("remembered session {session_id} is gone or not ours, falling back");
                self.remembered = None;
                self.adopt_or_create(auth).await
            }
            Err(e) => {
                warn!("verify of remembered session {session_id} failed: {e}");
                self.adopt_or_create(auth).await
            }
        }
    }

    /// Adopts the most recently updated active session for the user, or
    /// creates a fresh one when none exists.
    async fn adopt_or_create(&mut self, auth: &AuthContext) -> StoreResult<&SessionCache> {
        match self.store.latest_active_session(auth.user_id).await? {
            Some(row) => {
                info!("adopting active session {} for user {}", row.session_id, auth.user_id);
                self.load_session(row).await
            }
            None => self.create_session(auth).await,
        }
    }

    /// Mints a new identifier, persists an `active` row with empty memory and
    /// seeds the welcome message.
    async fn create_session(&mut self, auth: &AuthContext) -> StoreResult<&SessionCache> {
        let session_id = Uuid::new_v4();
        self.store.insert_session(session_id, auth.user_id).await?;
        info!("created session {session_id} for user {}", auth.user_id);

        let mut cache = SessionCache::empty(session_id);
        let welcome = self
            .store
            .insert_message(session_id, Sender::Assistant, WELCOME_MESSAGE, Utc::now())
            .await?;
        cache.messages.push(welcome);

        self.remembered = Some(session_id);
        self.cache = Some(cache);
        Ok(self.cache.as_ref().expect("cache just set"))
    }

    /// Rebuilds the cache wholesale from a persisted row and its transcript.
    /// Seeds the welcome message into sessions adopted with an empty
    /// transcript, so a reload lands on the same first message every time.
    async fn load_session(&mut self, row: SessionRow) -> StoreResult<&SessionCache> {
        let session_id = row.session_id;
        let memory = row.memory();
        let resume_html = memory
            .resume_html
            .as_deref()
            .or(row.resume_html.as_deref())
            .map(sanitize_html);

        let mut messages = self.store.messages_for_session(session_id).await?;
        if messages.is_empty() {
            let welcome = self
                .store
                .insert_message(session_id, Sender::Assistant, WELCOME_MESSAGE, Utc::now())
                .await?;
            messages.push(welcome);
        }

        self.remembered = Some(session_id);
        self.cache = Some(SessionCache {
            session_id,
            messages,
            memory,
            resume_html,
        });
        Ok(self.cache.as_ref().expect("cache just set"))
    }

    /// Re-runs verification when the tab regains visibility and the
    /// remembered pointer no longer matches the loaded session (another tab
    /// may have started a new session). Cross-tab edits are never merged;
    /// the cache is replaced wholesale. Returns whether a replace happened.
    pub async fn reconcile_on_visibility_change(
        &mut self,
        auth: &AuthContext,
    ) -> StoreResult<bool> {
        let Some(remembered) = self.remembered else {
            return Ok(false);
        };
        if self.cache.as_ref().map(|c| c.session_id) == Some(remembered) {
            return Ok(false);
        }
        self.verify_and_restore(remembered, auth).await?;
        Ok(true)
    }

    /// Best-effort status flip on page unload / teardown. Must never block
    /// navigation: failures are logged and swallowed.
    pub async fn mark_inactive_on_unload(&self) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = self
            .store
            .update_status(cache.session_id, SessionStatus::Inactive)
            .await
        {
            warn!("failed to mark session {} inactive: {e}", cache.session_id);
        }
    }

    /// Explicit reset: the current session becomes `completed` (terminal for
    /// that identifier) and a fresh active session takes its place.
    pub async fn complete_and_start_over(
        &mut self,
        auth: &AuthContext,
    ) -> StoreResult<&SessionCache> {
        if let Some(cache) = &self.cache {
            if let Err(e) = self
                .store
                .update_status(cache.session_id, SessionStatus::Completed)
                .await
            {
                warn!("failed to complete session {}: {e}", cache.session_id);
            }
        }
        self.create_session(auth).await
    }

    /// Appends one transcript entry and mirrors it into the cache. Callers
    /// must await this before doing anything that depends on the entry being
    /// durable (the controller awaits the user entry before dispatching to
    /// the generator).
    pub async fn persist_turn(
        &mut self,
        sender: Sender,
        content: &str,
    ) -> StoreResult<ChatMessageRow> {
        let cache = self
            .cache
            .as_mut()
            .ok_or_else(|| crate::store::StoreError::Unavailable("no session loaded".into()))?;
        let row = self
            .store
            .insert_message(cache.session_id, sender, content, Utc::now())
            .await?;
        cache.messages.push(row.clone());
        Ok(row)
    }

    /// Overwrites the session's memory map, embedding new resume markup both
    /// in the map and in the dedicated column. Last write wins; concurrent
    /// writers are superseded, not merged.
    pub async fn persist_memory(
        &mut self,
        mut memory: MemoryData,
        resume_html: Option<String>,
    ) -> StoreResult<()> {
        let cache = self
            .cache
            .as_mut()
            .ok_or_else(|| crate::store::StoreError::Unavailable("no session loaded".into()))?;
        if let Some(html) = &resume_html {
            memory.resume_html = Some(html.clone());
        }
        self.store
            .update_memory(cache.session_id, &memory, resume_html.as_deref())
            .await?;
        cache.memory = memory;
        if resume_html.is_some() {
            cache.resume_html = resume_html;
        }
        Ok(())
    }
}
