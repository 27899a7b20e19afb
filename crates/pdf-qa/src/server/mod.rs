//! HTTP server for the PDF Q&A service

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::Result;
use state::AppState;

/// PDF Q&A HTTP Server
pub struct PdfQaServer {
    state: AppState,
}

impl PdfQaServer {
    /// Create a server backed by the OpenAI client and the in-memory store
    pub fn new(config: AppConfig) -> Result<Self> {
        let state = AppState::new(config)?;
        Ok(Self { state })
    }

    /// Create a server around existing state
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let config = &self.state.config().server;

        let router = Router::new()
            // Health check
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .merge(routes::api_routes(config.max_upload_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| crate::error::Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting PDF Q&A server on http://{}", addr);
        tracing::info!("Upload endpoint: POST http://{}/process-and-query/", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::Error::Config(format!("Failed to bind: {}", e)))?;

        let state = self.state.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Cannot listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutdown requested, draining in-flight requests");
                state.set_ready(false);
            })
            .await
            .map_err(|e| crate::error::Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        let server = &self.state.config().server;
        format!("{}:{}", server.host, server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint: the server is accepting work and every
/// provider answers its health check
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (embedding, chat, vector_store) = futures::join!(
        state.embedding_provider().health_check(),
        state.chat_model().health_check(),
        state.vector_store_provider().health_check(),
    );
    let embedding = embedding.unwrap_or(false);
    let chat = chat.unwrap_or(false);
    let vector_store = vector_store.unwrap_or(false);

    let ready = state.is_ready() && embedding && chat && vector_store;
    if !ready {
        tracing::warn!(
            "Not ready (serving: {}, embedding: {}, chat: {}, vector store: {})",
            state.is_ready(),
            embedding,
            chat,
            vector_store
        );
    }

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": ready,
            "embedding": embedding,
            "chat": chat,
            "vector_store": vector_store,
        })),
    )
}
