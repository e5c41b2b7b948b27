// creatorflow server
//
// HTTP surface over the workflow engine plus the wait scheduler that
// resumes elapsed waits.

pub mod api;
pub mod config;
pub mod openai;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use creatorflow_engine::action::{builtin_actions, Collaborators};
use creatorflow_engine::engine::{EngineConfig, WorkflowEngine};
use creatorflow_engine::persistence::{InMemoryStore, PostgresStore, WorkflowStore};

pub use api::{router, AppState};
pub use config::ServerConfig;
pub use scheduler::WaitScheduler;

use crate::openai::OpenAiContentGenerator;

/// Engine over a type-erased store, as shared by the API and the scheduler
pub type Engine = WorkflowEngine<dyn WorkflowStore>;

/// Build the engine from configuration
///
/// With `DATABASE_URL` set the PostgreSQL store is connected and migrated;
/// otherwise an empty in-memory store is used.
pub async fn build_engine(config: &ServerConfig) -> Result<Arc<Engine>> {
    let mut services = Collaborators::recording();
    match &config.openai {
        Some(openai) => {
            let generator = OpenAiContentGenerator::new(openai);
            tracing::info!(api_url = %generator.api_url(), model = %openai.model, "ai_generate uses OpenAI");
            services.generator = Arc::new(generator);
        }
        None => tracing::info!("OPENAI_API_KEY not set; ai_generate returns canned content"),
    }

    let engine_config = EngineConfig {
        retry_base_unit: config.retry_base_unit,
        ..EngineConfig::default()
    };

    let (store, actions) = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Connected to database");

            let store = Arc::new(store);
            let actions = builtin_actions(store.clone(), &services);
            let store: Arc<dyn WorkflowStore> = store;
            (store, actions)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            let store = Arc::new(InMemoryStore::new());
            let actions = builtin_actions(store.clone(), &services);
            let store: Arc<dyn WorkflowStore> = store;
            (store, actions)
        }
    };

    let engine = WorkflowEngine::with_config(store, actions, engine_config)
        .with_alerts(services.notifier.clone());
    Ok(Arc::new(engine))
}
