//! Recursive character text splitting with overlap and page tracking

use std::collections::VecDeque;

use super::parser::ParsedPdf;
use crate::types::{Chunk, ChunkSource};

/// Separators tried in order: paragraphs, lines, words, characters
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Text chunker with configurable size and overlap (sizes in characters)
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between neighbouring chunks
    overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Chunk every page of a parsed PDF, numbering chunks across pages
    pub fn chunk_pdf(&self, parsed: &ParsedPdf) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            let mut search_from = 0usize;
            for piece in self.split_text(&page.content) {
                let (char_start, char_end, next) = locate(&page.content, &piece, search_from);
                search_from = next;

                let source = ChunkSource {
                    filename: parsed.filename.clone(),
                    page_number: Some(page.page_number),
                    page_count: Some(parsed.total_pages),
                    char_start,
                    char_end,
                };
                chunks.push(Chunk::new(chunks.len() as u32, piece, source));
            }
        }

        chunks
    }

    /// Split text into chunks of at most `chunk_size` characters
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // Pick the first separator present in the text; "" always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        let mut good_splits: Vec<String> = Vec::new();
        for split in splits {
            if char_len(&split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, separator));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(split);
            } else {
                final_chunks.extend(self.split_recursive(&split, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, separator));
        }

        final_chunks
    }

    /// Merge small pieces into chunks, carrying up to `overlap` characters forward
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current, separator) {
                    docs.push(doc);
                }

                // Drop from the front until we are within the overlap and the
                // next piece fits
                while total > self.overlap
                    || (total + len + if current.is_empty() { 0 } else { sep_len } > self.chunk_size
                        && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            current.push_back(split);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        if let Some(doc) = join_trimmed(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_trimmed(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Find `piece` in `text` at or after byte offset `from`.
///
/// Returns the char range of the match and the byte offset to resume from.
/// Overlapping chunks start before the previous one ends, so the search
/// resumes just past the previous match start, not its end.
fn locate(text: &str, piece: &str, from: usize) -> (usize, usize, usize) {
    let from = from.min(text.len());
    let byte_start = text[from..]
        .find(piece)
        .map(|pos| from + pos)
        .or_else(|| text.find(piece))
        .unwrap_or(from);

    let char_start = text[..byte_start].chars().count();
    let char_end = char_start + char_len(piece);

    let mut next = byte_start + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }

    (char_start, char_end, next)
}
