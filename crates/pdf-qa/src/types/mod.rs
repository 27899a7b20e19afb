//! Core types for the PDF Q&A service

pub mod document;
pub mod question;
pub mod response;

pub use document::{Chunk, ChunkSource};
pub use question::{Answer, Question, DATA_NOT_AVAILABLE};
pub use response::ProcessResponse;
