//! Application state for the PDF Q&A server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::orchestrator::QueryOrchestrator;
use crate::providers::{
    ChatModel, EmbeddingProvider, MemoryVectorStore, OpenAiClient, VectorStoreProvider,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: Arc<AppConfig>,
    /// Embedding provider
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// Chat model driving the agent
    chat_model: Arc<dyn ChatModel>,
    /// Vector store handing out per-request collections
    vector_store_provider: Arc<dyn VectorStoreProvider>,
    /// Orchestrator shared by all requests
    orchestrator: QueryOrchestrator,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create application state with the OpenAI client and the in-memory store
    pub fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing PDF Q&A application state...");

        let client = Arc::new(OpenAiClient::new(&config.openai)?);
        tracing::info!(
            "OpenAI client initialized (chat: {}, embeddings: {})",
            ChatModel::model(client.as_ref()),
            config.openai.embed_model
        );

        let storage_path = config.vector_db.require_storage_path()?;
        let store = Arc::new(
            MemoryVectorStore::new(storage_path, config.vector_db.persist_collections)?
                .with_max_snapshots(config.vector_db.max_snapshots),
        );
        tracing::info!("Vector store initialized at {}", storage_path.display());

        Ok(Self::from_parts(config, client.clone(), client, store))
    }

    /// Create application state from explicit providers
    pub fn from_parts(
        config: AppConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
        vector_store_provider: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let config = Arc::new(config);
        let orchestrator = QueryOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&embedding_provider),
            Arc::clone(&chat_model),
            Arc::clone(&vector_store_provider),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                chat_model,
                vector_store_provider,
                orchestrator,
                ready: RwLock::new(true),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    pub fn chat_model(&self) -> &Arc<dyn ChatModel> {
        &self.inner.chat_model
    }

    pub fn vector_store_provider(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store_provider
    }

    pub fn orchestrator(&self) -> &QueryOrchestrator {
        &self.inner.orchestrator
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
