//! PDF text extraction

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Ligatures and typographic characters that PDF fonts commonly emit,
/// mapped to plain-text equivalents
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Clean up extracted PDF text: typographic characters, NUL bytes,
/// trailing whitespace and blank lines
pub fn cleanup_pdf_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => result.push_str(to),
            None if c == '\0' => {}
            None => result.push(c),
        }
    }

    result
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Cleaned text content of the page
    pub content: String,
}

/// A parsed PDF
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    /// Filename the bytes were uploaded as
    pub filename: String,
    /// Pages with extractable text, in document order
    pub pages: Vec<PageContent>,
    /// Total pages in the document, including pages without text
    pub total_pages: u32,
    /// SHA-256 of the raw bytes, hex encoded
    pub content_hash: String,
}

impl ParsedPdf {
    /// Total characters of extracted text
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.chars().count()).sum()
    }
}

/// PDF parser: per-page extraction with lopdf, falling back to
/// pdf-extract over the whole document
pub struct PdfParser {
    extract_timeout: Duration,
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl PdfParser {
    /// Create a parser with the given pdf-extract timeout
    pub fn new(extract_timeout: Duration) -> Self {
        Self { extract_timeout }
    }

    /// Read and parse a PDF from disk
    pub fn parse_file(&self, path: &Path) -> Result<ParsedPdf> {
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        self.parse(&filename, &data)
    }

    /// Parse PDF bytes
    pub fn parse(&self, filename: &str, data: &[u8]) -> Result<ParsedPdf> {
        if !data.starts_with(b"%PDF") {
            return Err(Error::file_parse(filename, "Not a PDF file (missing %PDF header)"));
        }

        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total_pages = page_numbers.len() as u32;

        let mut pages = Vec::new();
        for page_number in page_numbers {
            match doc.extract_text(&[page_number]) {
                Ok(text) => {
                    let content = cleanup_pdf_text(&text);
                    if !content.is_empty() {
                        pages.push(PageContent {
                            page_number,
                            content,
                        });
                    }
                }
                Err(e) => {
                    tracing::debug!("lopdf could not extract page {} of {}: {}", page_number, filename, e);
                }
            }
        }

        if pages.is_empty() {
            tracing::warn!("lopdf found no text in {}, trying pdf-extract", filename);
            let content = cleanup_pdf_text(&self.extract_with_timeout(filename, data)?);
            if !content.is_empty() {
                pages.push(PageContent {
                    page_number: 1,
                    content,
                });
            }
        }

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF (image-based or encrypted?)",
            ));
        }

        Ok(ParsedPdf {
            filename: filename.to_string(),
            pages,
            total_pages: total_pages.max(1),
            content_hash: hash_bytes(data),
        })
    }

    /// Run pdf-extract on a worker thread so a pathological font cannot hang the request.
    ///
    /// pdf-extract cannot be interrupted: after a timeout the worker thread is
    /// detached and keeps running (and holding its copy of the file) until the
    /// extraction finishes on its own. Its result is then discarded.
    fn extract_with_timeout(&self, filename: &str, data: &[u8]) -> Result<String> {
        use std::sync::mpsc;
        use std::thread;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.extract_timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::file_parse(filename, format!("pdf-extract failed: {}", e))),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "PDF extraction of {} timed out after {:?}",
                    filename,
                    self.extract_timeout
                );
                Err(Error::Timeout(format!(
                    "PDF text extraction exceeded {}s",
                    self.extract_timeout.as_secs()
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::file_parse(
                filename,
                "PDF extraction thread crashed",
            )),
        }
    }
}

/// SHA-256 of raw bytes, hex encoded
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
