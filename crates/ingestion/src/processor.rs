//! Document processing
//!
//! Dispatches uploaded files to the per-format extractors and stamps
//! identity metadata (filename, type, content hash) used downstream for
//! duplicate detection and citations.

use crate::errors::IngestionError;
use crate::extract::{extract_csv, extract_pdf, extract_txt, ExtractedDocument};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument};

/// Extracts text from uploaded documents based on file type.
#[derive(Debug, Default, Clone)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Compute the SHA-256 hash of a file, streaming in 4 KiB blocks.
    pub fn compute_hash(path: &Path) -> Result<String, IngestionError> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 4096];

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Process a document: extract text per file type and fill in
    /// filename, file type, and content hash metadata.
    #[instrument(skip(self), fields(filename = %filename))]
    pub fn process(&self, path: &Path, filename: &str) -> Result<ExtractedDocument, IngestionError> {
        let extension = Path::new(filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        let mut extracted = match extension.as_str() {
            ".pdf" => extract_pdf(path)?,
            ".txt" => extract_txt(path)?,
            ".csv" => extract_csv(path)?,
            _ => {
                return Err(IngestionError::UnsupportedFileType {
                    extension: extension.clone(),
                })
            }
        };

        extracted.metadata.filename = filename.to_string();
        extracted.metadata.file_type = extension;
        extracted.metadata.file_hash = Some(Self::compute_hash(path)?);

        info!(
            file_type = %extracted.metadata.file_type,
            characters = extracted.text.chars().count(),
            "Document processed"
        );

        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compute_hash_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "stable content").unwrap();

        let first = DocumentProcessor::compute_hash(file.path()).unwrap();
        let second = DocumentProcessor::compute_hash(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_process_txt_fills_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "notes body").unwrap();

        let processor = DocumentProcessor::new();
        let extracted = processor.process(file.path(), "notes.txt").unwrap();

        assert_eq!(extracted.text, "notes body");
        assert_eq!(extracted.metadata.filename, "notes.txt");
        assert_eq!(extracted.metadata.file_type, ".txt");
        assert!(extracted.metadata.file_hash.is_some());
    }

    #[test]
    fn test_process_rejects_unknown_extension() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let processor = DocumentProcessor::new();
        let err = processor.process(file.path(), "slides.pptx").unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_process_rejects_missing_extension() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let processor = DocumentProcessor::new();
        assert!(processor.process(file.path(), "README").is_err());
    }
}
