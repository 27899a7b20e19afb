//! Document ingestion: PDF text extraction, chunking and upload handling

mod chunker;
mod parser;
mod upload;

pub use chunker::TextChunker;
pub use parser::{cleanup_pdf_text, hash_bytes, PageContent, ParsedPdf, PdfParser};
pub use upload::ScopedUpload;

use std::path::Path;
use std::time::Duration;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

/// Turns a PDF on disk into ordered, unembedded chunks
pub struct DocumentLoader {
    parser: PdfParser,
    chunker: TextChunker,
}

impl DocumentLoader {
    /// Create a loader from chunking configuration
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            parser: PdfParser::new(Duration::from_secs(config.extract_timeout_secs)),
            chunker: TextChunker::new(config.chunk_size, config.chunk_overlap),
        }
    }

    /// Parse and chunk the PDF at `path`, reporting `filename` as its source
    pub fn load(&self, path: &Path, filename: &str) -> Result<Vec<Chunk>> {
        let data = std::fs::read(path)?;
        let parsed = self.parser.parse(filename, &data)?;

        let chunks = self.chunker.chunk_pdf(&parsed);
        if chunks.is_empty() {
            return Err(Error::file_parse(filename, "Document produced no chunks"));
        }

        tracing::info!(
            "Loaded {}: {} pages, {} chars, {} chunks (sha256 {})",
            filename,
            parsed.total_pages,
            parsed.char_count(),
            chunks.len(),
            &parsed.content_hash[..12]
        );

        Ok(chunks)
    }
}
