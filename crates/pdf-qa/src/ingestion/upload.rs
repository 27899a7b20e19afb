//! Request-scoped storage for uploaded files

use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// An uploaded file persisted to a temporary path for the lifetime of one request.
///
/// The file is removed when the value is dropped, whether the request
/// succeeded, failed or was cancelled.
#[derive(Debug)]
pub struct ScopedUpload {
    file: NamedTempFile,
    filename: String,
    size: usize,
}

impl ScopedUpload {
    /// Write `data` to a fresh temporary file in `dir` (system temp dir if `None`)
    pub async fn persist(dir: Option<PathBuf>, filename: &str, data: Bytes) -> Result<Self> {
        let filename = filename.to_string();

        tokio::task::spawn_blocking(move || Self::persist_blocking(dir.as_deref(), filename, &data))
            .await?
    }

    fn persist_blocking(dir: Option<&Path>, filename: String, data: &[u8]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdfqa-").suffix(".pdf");

        let mut file = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(|e| Error::internal(format!("Failed to create temp file: {}", e)))?;

        file.write_all(data)?;
        file.flush()?;

        tracing::debug!(
            "Stored upload {} ({} bytes) at {}",
            filename,
            data.len(),
            file.path().display()
        );

        Ok(Self {
            file,
            filename,
            size: data.len(),
        })
    }

    /// Path of the temporary file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Filename the client uploaded
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}
