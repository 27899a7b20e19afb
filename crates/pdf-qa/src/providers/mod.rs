//! Provider abstractions for embeddings, chat models and vector storage
//!
//! The agent and orchestrator only see the traits, so tests can swap the
//! OpenAI client and the in-memory store for fakes.

pub mod embedding;
pub mod llm;
pub mod memory;
pub mod openai;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatCompletion, ChatModel, Message, Role, TokenUsage};
pub use memory::MemoryVectorStore;
pub use openai::OpenAiClient;
pub use vector_store::{VectorCollection, VectorSearchResult, VectorStoreProvider};
