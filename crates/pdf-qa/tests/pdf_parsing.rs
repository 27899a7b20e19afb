//! PDF extraction and loading against PDFs generated in-process

mod common;

use common::pdf_with_pages;
use pdf_qa::config::ChunkingConfig;
use pdf_qa::ingestion::{DocumentLoader, PdfParser};

#[test]
fn test_extracts_text_per_page() {
    let pdf = pdf_with_pages(&["The sky is blue.", "Grass is green."]);
    let parsed = PdfParser::default().parse("colors.pdf", &pdf).unwrap();

    assert_eq!(parsed.filename, "colors.pdf");
    assert_eq!(parsed.total_pages, 2);
    assert_eq!(parsed.pages.len(), 2);
    assert_eq!(parsed.pages[0].page_number, 1);
    assert!(parsed.pages[0].content.contains("sky is blue"));
    assert!(parsed.pages[1].content.contains("Grass is green"));
    assert_eq!(parsed.content_hash.len(), 64);
}

#[test]
fn test_parse_file_uses_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, pdf_with_pages(&["Meeting at noon."])).unwrap();

    let parsed = PdfParser::default().parse_file(&path).unwrap();
    assert_eq!(parsed.filename, "notes.pdf");
    assert!(parsed.char_count() > 0);
}

#[test]
fn test_loader_chunks_with_page_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.pdf");
    std::fs::write(&path, pdf_with_pages(&["The sky is blue.", "Grass is green."])).unwrap();

    let loader = DocumentLoader::new(&ChunkingConfig::default());
    let chunks = loader.load(&path, "colors.pdf").unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].source.filename, "colors.pdf");
    assert_eq!(chunks[0].source.page_number, Some(1));
    assert_eq!(chunks[1].source.page_number, Some(2));
    assert_eq!(chunks[1].index, 1);
    assert!(chunks.iter().all(|c| !c.is_embedded()));
}

#[test]
fn test_loader_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.pdf");
    std::fs::write(&path, b"definitely not a pdf").unwrap();

    let loader = DocumentLoader::new(&ChunkingConfig::default());
    assert!(loader.load(&path, "upload.pdf").is_err());
}
