//! Ingestion error types

use docassist_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedFileType { extension } => AppError::Validation {
                message: format!("Unsupported file type: {extension}"),
                field: Some("filename".to_string()),
            },
            other => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}
