//! pdf-qa: answer questions about an uploaded PDF with a retrieval agent
//!
//! The PDF is chunked and embedded into a request-scoped vector collection.
//! Each question then runs a ReAct agent whose only tool searches that
//! collection, and the agent's JSON answer is filtered by its reported
//! confidence.

pub mod agent;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod orchestrator;
pub mod providers;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use orchestrator::QueryOrchestrator;
pub use types::{Answer, Chunk, ChunkSource, ProcessResponse, Question, DATA_NOT_AVAILABLE};
