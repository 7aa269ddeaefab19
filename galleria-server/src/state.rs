//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::ai::{
    EnvLayer, GenerationClient, GenerationOrchestrator, Materializer, OrchestratorConfig,
    SettingsResolver,
};
use crate::config::Config;
use crate::entities::SqliteStore;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persistent gallery store.
    pub store: Arc<SqliteStore>,
    /// Layered AI settings (request override, database, environment, default).
    pub settings: Arc<SettingsResolver>,
    /// Client for synchronous upstream calls (`/ai/chat`).
    pub client: GenerationClient,
    /// Background generation queue.
    pub orchestrator: GenerationOrchestrator,
}

impl AppState {
    /// Wire the AI pipeline around `store` and start the generation workers.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: Config, store: SqliteStore, env: EnvLayer) -> Self {
        let store = Arc::new(store);
        let settings = Arc::new(SettingsResolver::standard(Arc::clone(&store), env));

        let http = reqwest::Client::builder()
            .user_agent(concat!("galleria-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        let client = GenerationClient::new(http.clone());
        let materializer = Materializer::new(http, &config.content_dir, &config.public_prefix);

        let orchestrator = GenerationOrchestrator::start(
            OrchestratorConfig {
                queue_capacity: config.queue_capacity,
                concurrency: config.worker_concurrency,
                mock_delay: config.mock_delay,
                mock_image_url: config.mock_image_url.clone(),
            },
            Arc::clone(&store),
            Arc::clone(&settings),
            client.clone(),
            materializer,
        );

        Self {
            config: Arc::new(config),
            store,
            settings,
            client,
            orchestrator,
        }
    }
}
