//! On-disk layout for consent documents
//!
//! ```text
//! {root}/{document_id}/original/{filename}
//! {root}/{document_id}/signed/signed.pdf
//! ```

use std::io;
use std::path::{Path, PathBuf};

use consent_pdf::{PdfError, TextLayout};
use thiserror::Error;

use crate::models::DEFAULT_FILENAME;

const SIGNED_FILENAME: &str = "signed.pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("PDF generation failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A PDF written to the original-document slot
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_path(&self, document_id: &str, filename: &str) -> PathBuf {
        self.root
            .join(document_id)
            .join("original")
            .join(filename)
    }

    pub fn signed_path(&self, document_id: &str) -> PathBuf {
        self.root
            .join(document_id)
            .join("signed")
            .join(SIGNED_FILENAME)
    }

    /// Store an uploaded PDF as-is
    pub async fn save_original(
        &self,
        document_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredDocument, StorageError> {
        let path = self.original_path(document_id, filename);
        write_file(&path, &bytes).await?;
        Ok(StoredDocument {
            path,
            filename: filename.to_string(),
            bytes,
        })
    }

    /// Render text to a PDF and store it as the original document
    pub async fn write_generated(
        &self,
        document_id: &str,
        text: &str,
        layout: &TextLayout,
    ) -> Result<StoredDocument, StorageError> {
        let path = self.original_path(document_id, DEFAULT_FILENAME);
        let text = text.to_string();
        let layout = layout.clone();
        let target = path.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            consent_pdf::write_text_pdf(&text, &layout, &target)
        })
        .await??;

        tracing::debug!(
            "Rendered consent text for {}: {} lines on {} pages",
            document_id,
            rendered.line_count,
            rendered.page_count
        );

        Ok(StoredDocument {
            path,
            filename: DEFAULT_FILENAME.to_string(),
            bytes: rendered.bytes,
        })
    }

    /// Open the signed PDF for streaming. `Ok(None)` if the file is not there.
    pub async fn open_signed(
        &self,
        document_id: &str,
    ) -> Result<Option<SignedFile>, StorageError> {
        let file = match tokio::fs::File::open(self.signed_path(document_id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Some(SignedFile { file, len }))
    }
}

/// An open handle on a signed PDF
#[derive(Debug)]
pub struct SignedFile {
    pub file: tokio::fs::File,
    pub len: u64,
}

async fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
