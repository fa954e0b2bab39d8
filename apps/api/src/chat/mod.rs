//! Conversation Controller: drives the turn-taking protocol.
//!
//! One full turn is one user message in and one assistant message out, with
//! optional side effects on the completeness map and resume markup. Turns are
//! strictly serialized: the HTTP layer rejects a new turn while a prior one
//! is in flight (see `routes::chat`), and within a turn every persistence
//! step is awaited before the next one starts.

use tracing::warn;

use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::generator::GeneratorClient;
use crate::models::message::{ChatMessageRow, Sender};
use crate::sanitize::sanitize_html;
use crate::session::{SessionCache, SessionReconciler};

/// Transient notice when the generator stays down through all retries.
pub const DEGRADED_NOTICE: &str =
    "The assistant is having trouble right now. Please try again in a moment.";

/// Transient notice for unusable generator responses.
pub const INVALID_RESPONSE_NOTICE: &str =
    "The service returned an invalid response. Please try again later.";

/// Outcome of a submitted turn.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank or whitespace-only input; nothing happened.
    Ignored,
    /// The turn ran. `assistant` is the persisted reply when the generator
    /// answered. `notice` is transient and never persisted: it carries the
    /// degraded/invalid-response text when the call failed, or an error the
    /// generator reported alongside an otherwise usable reply.
    Completed {
        assistant: Option<ChatMessageRow>,
        notice: Option<String>,
    },
}

pub struct ConversationController {
    reconciler: SessionReconciler,
    generator: GeneratorClient,
}

impl ConversationController {
    pub fn new(reconciler: SessionReconciler, generator: GeneratorClient) -> Self {
        ConversationController {
            reconciler,
            generator,
        }
    }

    pub fn reconciler(&self) -> &SessionReconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut SessionReconciler {
        &mut self.reconciler
    }

    pub fn cache(&self) -> Option<&SessionCache> {
        self.reconciler.cache()
    }

    /// Makes sure a session cache is loaded before a turn or export runs.
    pub async fn ensure_session(&mut self, auth: &AuthContext) -> Result<(), AppError> {
        if self.reconciler.cache().is_none() {
            self.reconciler.restore_or_create(auth).await?;
        }
        Ok(())
    }

    /// Runs one conversation turn.
    ///
    /// CRITICAL ordering: the user entry is persisted before the generator is
    /// invoked, and the assistant entry is persisted before the turn
    /// completes, so a tab closing mid-turn can lose at most the assistant
    /// reply, never the user's message.
    ///
    /// A failed generator call leaves the transcript, memory map and resume
    /// markup exactly as they were before the call.
    pub async fn submit_turn(
        &mut self,
        auth: &AuthContext,
        input: &str,
    ) -> Result<TurnOutcome, AppError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        self.ensure_session(auth).await?;
        let session_id = self
            .reconciler
            .cache()
            .map(|c| c.session_id)
            .expect("ensure_session loaded a cache");

        // User entry first, awaited, so the message survives a failed call.
        self.reconciler.persist_turn(Sender::User, text).await?;

        let reply = match self.generator.send_turn(auth, session_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("turn failed for session {session_id}: {e}");
                let notice = if e.is_transient() {
                    DEGRADED_NOTICE
                } else {
                    INVALID_RESPONSE_NOTICE
                };
                return Ok(TurnOutcome::Completed {
                    assistant: None,
                    notice: Some(notice.to_string()),
                });
            }
        };

        let assistant = self
            .reconciler
            .persist_turn(Sender::Assistant, &reply.message)
            .await?;

        // Only a map the generator actually returned may overwrite the
        // persisted one; an omitted map must not wipe collected slots.
        let sanitized_resume = reply.resume_html.as_deref().map(sanitize_html);
        if reply.collected_info.is_some() || sanitized_resume.is_some() {
            let memory = reply
                .collected_info
                .unwrap_or_else(|| self.reconciler.cache().map(|c| c.memory.clone()).unwrap_or_default());
            self.reconciler
                .persist_memory(memory, sanitized_resume)
                .await?;
        }

        Ok(TurnOutcome::Completed {
            assistant: Some(assistant),
            notice: reply.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::SessionStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_auth() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            access_token: "token".to_string(),
        }
    }

    fn controller(store: &Arc<MemoryStore>, server: &MockServer) -> ConversationController {
        let reconciler = SessionReconciler::new(store.clone() as Arc<dyn SessionStore>);
        let generator = GeneratorClient::new(format!("{}/webhook", server.uri()))
            .with_retry_delay(Duration::from_millis(10));
        ConversationController::new(reconciler, generator)
    }

    #[tokio::test]
    async fn blank_input_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();
        let mut ctl = controller(&store, &server);

        let outcome = ctl.submit_turn(&auth, "   \n  ").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert!(store.sessions_for_user(auth.user_id).is_empty());
    }

    #[tokio::test]
    async fn full_turn_persists_user_then_assistant_and_applies_memory() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Great, tell me more",
                "collectedInfo": {
                    "personalInfo": { "collected": true, "data": { "name": "Jane" } },
                    "education": { "collected": false, "data": null },
                    "experience": { "collected": false, "data": null },
                    "skills": { "collected": false, "data": null }
                }
            })))
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        let outcome = ctl
            .submit_turn(&auth, "I'm a fresh graduate looking for my first job")
            .await
            .unwrap();

        let TurnOutcome::Completed { assistant, notice } = outcome else {
            panic!("expected a completed turn");
        };
        assert!(notice.is_none());
        assert_eq!(assistant.unwrap().content, "Great, tell me more");

        let cache = ctl.cache().unwrap();
        // Welcome + user + assistant.
        assert_eq!(cache.messages.len(), 3);
        assert!(cache.messages[1].is_from(Sender::User));
        assert!(cache.messages[2].is_from(Sender::Assistant));
        assert!(cache.messages[1].created_at < cache.messages[2].created_at);
        assert!(cache.memory.personal_info.collected);
        assert!(cache.resume_html.is_none());

        let row = store.session(cache.session_id).unwrap();
        assert!(row.memory().personal_info.collected);
    }

    #[tokio::test]
    async fn resume_markup_is_sanitized_before_store_and_display() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "message": "Here is your resume",
                "resumeHtml": "<div>Jane</div><script>alert('x')</script>"
            }])))
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        ctl.submit_turn(&auth, "generate my resume").await.unwrap();

        let cache = ctl.cache().unwrap();
        let displayed = cache.resume_html.as_deref().unwrap();
        assert!(displayed.contains("Jane"));
        assert!(!displayed.contains("script"));

        let row = store.session(cache.session_id).unwrap();
        let stored = row.resume_html.clone().unwrap();
        assert!(!stored.contains("script"));
        assert_eq!(row.memory().resume_html.as_deref(), Some(stored.as_str()));
    }

    #[tokio::test]
    async fn failed_turn_leaves_resume_and_memory_untouched() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "noted",
                "resumeHtml": "<div>v1</div>",
                "collectedInfo": {
                    "personalInfo": { "collected": true, "data": null },
                    "education": { "collected": false, "data": null },
                    "experience": { "collected": false, "data": null },
                    "skills": { "collected": false, "data": null }
                }
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        ctl.submit_turn(&auth, "first turn").await.unwrap();

        let before_memory = ctl.cache().unwrap().memory.clone();
        let before_resume = ctl.cache().unwrap().resume_html.clone();
        let before_len = ctl.cache().unwrap().messages.len();

        let outcome = ctl.submit_turn(&auth, "second turn").await.unwrap();
        let TurnOutcome::Completed { assistant, notice } = outcome else {
            panic!("expected a completed turn");
        };
        assert!(assistant.is_none());
        assert_eq!(notice.as_deref(), Some(DEGRADED_NOTICE));

        let cache = ctl.cache().unwrap();
        assert_eq!(cache.memory, before_memory);
        assert_eq!(cache.resume_html, before_resume);
        // The user entry survived; no assistant entry was appended.
        assert_eq!(cache.messages.len(), before_len + 1);
        assert!(cache.messages.last().unwrap().is_from(Sender::User));
    }

    #[tokio::test]
    async fn user_entry_is_persisted_even_when_generator_never_answers() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        ctl.submit_turn(&auth, "please keep this").await.unwrap();

        let session_id = ctl.cache().unwrap().session_id;
        let persisted = store.messages_for_session(session_id).await.unwrap();
        assert!(persisted
            .iter()
            .any(|m| m.is_from(Sender::User) && m.content == "please keep this"));
    }

    #[tokio::test]
    async fn omitted_completeness_map_does_not_wipe_collected_slots() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "ok",
                "collectedInfo": {
                    "personalInfo": { "collected": true, "data": null },
                    "education": { "collected": true, "data": null },
                    "experience": { "collected": false, "data": null },
                    "skills": { "collected": false, "data": null }
                }
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "message": "just chatting" })),
            )
            .with_priority(2)
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        ctl.submit_turn(&auth, "here's my background").await.unwrap();
        ctl.submit_turn(&auth, "thanks").await.unwrap();

        let cache = ctl.cache().unwrap();
        assert!(cache.memory.personal_info.collected);
        assert!(cache.memory.education.collected);
        let row = store.session(cache.session_id).unwrap();
        assert!(row.memory().education.collected);
    }

    #[tokio::test]
    async fn generator_error_field_is_surfaced_as_notice() {
        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let auth = test_auth();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "partial answer",
                "error": "provider truncated the response"
            })))
            .mount(&server)
            .await;

        let mut ctl = controller(&store, &server);
        let outcome = ctl.submit_turn(&auth, "hello").await.unwrap();
        let TurnOutcome::Completed { assistant, notice } = outcome else {
            panic!("expected a completed turn");
        };
        assert_eq!(assistant.unwrap().content, "partial answer");
        assert_eq!(notice.as_deref(), Some("provider truncated the response"));
    }
}
