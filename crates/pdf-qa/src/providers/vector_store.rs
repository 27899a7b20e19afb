//! Vector store provider traits for storing and searching embeddings

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::Chunk;

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub similarity: f32,
}

/// One isolated collection of embedded chunks
#[async_trait]
pub trait VectorCollection: Send + Sync {
    /// Insert embedded chunks
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Search for the `top_k` chunks most similar to `query_embedding`
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Collection name
    fn name(&self) -> &str;
}

/// Trait for vector storage backends that hand out collections
///
/// Implementations:
/// - `MemoryVectorStore`: brute-force cosine search in memory, optional JSON snapshots
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Create a new, empty collection
    async fn create_collection(&self, name: &str) -> Result<Arc<dyn VectorCollection>>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
