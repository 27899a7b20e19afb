//! Chunk types with source tracking

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a chunk came from inside the uploaded document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Filename as uploaded by the client
    pub filename: String,
    /// Page number (1-indexed)
    pub page_number: Option<u32>,
    /// Total pages in the document
    pub page_count: Option<u32>,
    /// Character offset of the chunk start within its page
    pub char_start: usize,
    /// Character offset of the chunk end within its page
    pub char_end: usize,
}

/// A contiguous span of extracted document text used as a retrieval unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Position of the chunk within the document (0-indexed)
    pub index: u32,
    /// Text content
    pub content: String,
    /// Source information
    pub source: ChunkSource,
    /// Embedding vector, empty until the chunk is embedded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a new chunk without an embedding
    pub fn new(index: u32, content: String, source: ChunkSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            content,
            source,
            embedding: Vec::new(),
        }
    }

    /// Whether the chunk has been embedded
    pub fn is_embedded(&self) -> bool {
        !self.embedding.is_empty()
    }
}
