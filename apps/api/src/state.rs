use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::chat::ConversationController;
use crate::config::Config;
use crate::export::ExportCoordinator;
use crate::generator::GeneratorClient;
use crate::session::SessionReconciler;
use crate::store::SessionStore;

/// One controller per user, behind a mutex that doubles as the busy flag:
/// `try_lock` failing means a turn is already in flight.
pub type SharedController = Arc<Mutex<ConversationController>>;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub generator: GeneratorClient,
    pub exporter: ExportCoordinator,
    /// Startup configuration, retained for handlers that need deployment facts.
    #[allow(dead_code)]
    pub config: Config,
    controllers: Arc<RwLock<HashMap<Uuid, SharedController>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: GeneratorClient,
        exporter: ExportCoordinator,
        config: Config,
    ) -> Self {
        AppState {
            store,
            generator,
            exporter,
            config,
            controllers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the user's conversation controller, creating it on first use.
    pub async fn controller_for(&self, user_id: Uuid) -> SharedController {
        if let Some(controller) = self.controllers.read().await.get(&user_id) {
            return controller.clone();
        }
        let mut controllers = self.controllers.write().await;
        controllers
            .entry(user_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationController::new(
                    SessionReconciler::new(self.store.clone()),
                    self.generator.clone(),
                )))
            })
            .clone()
    }
}
