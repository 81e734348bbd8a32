//! Document upload and management handlers

use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use docassist_common::{
    errors::{AppError, Result},
    metrics,
    models::UploadDocumentResponse,
    store::DocumentSummary,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Upload and process a document.
///
/// Supports: PDF, TXT, CSV. The file is kept in the uploads directory
/// afterwards so the data-preview endpoint can re-read it.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadDocumentResponse>> {
    let trace_id = Uuid::new_v4().to_string();
    let start = Instant::now();
    info!(trace_id = %trace_id, "Upload request received");

    // Take the first file field from the form.
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("Invalid multipart payload: {e}"),
        field: None,
    })? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| AppError::Validation {
            message: format!("Failed to read uploaded file: {e}"),
            field: None,
        })?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(AppError::Validation {
            message: "No file provided".to_string(),
            field: Some("file".to_string()),
        });
    };

    // Strip any path components a client may have sent along.
    let filename = std::path::Path::new(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or(filename);

    validate_extension(&filename, &state.config.allowed_extensions())?;

    if data.is_empty() {
        return Err(AppError::Validation {
            message: "Uploaded file is empty".to_string(),
            field: Some("file".to_string()),
        });
    }
    let max_bytes = state.config.max_upload_bytes();
    if data.len() > max_bytes {
        return Err(AppError::PayloadTooLarge {
            size: data.len(),
            limit: max_bytes,
        });
    }

    // Save to the uploads directory (kept for data preview).
    let saved_path = std::path::Path::new(&state.config.upload.uploads_dir).join(&filename);
    tokio::fs::write(&saved_path, &data).await?;

    // Extract text and metadata.
    let processed = match state.processor.process(&saved_path, &filename) {
        Ok(processed) => processed,
        Err(e) => {
            let _ = tokio::fs::remove_file(&saved_path).await;
            warn!(trace_id = %trace_id, error = %e, "Document processing failed");
            return Err(e.into());
        }
    };

    // Duplicate detection by content hash.
    if let Some(hash) = processed.metadata.file_hash.as_deref() {
        if let Some(existing_doc_id) = state.store.find_by_hash(hash).await? {
            info!(trace_id = %trace_id, doc_id = %existing_doc_id, "Duplicate document detected");
            return Ok(Json(UploadDocumentResponse {
                doc_id: existing_doc_id,
                filename,
                file_type: processed.metadata.file_type,
                num_chunks: 0,
                message: "Document already exists (duplicate detected)".to_string(),
                trace_id,
            }));
        }
    }

    // Chunk and index.
    let chunks = state
        .chunker
        .chunk_text(&processed.text, Some(&processed.metadata));
    if chunks.is_empty() {
        let _ = tokio::fs::remove_file(&saved_path).await;
        warn!(trace_id = %trace_id, filename = %filename, "No text chunks created from document");
        return Err(AppError::EmptyDocument { filename });
    }

    let doc_id = Uuid::new_v4().to_string();
    state.store.add_chunks(&chunks, &doc_id).await?;

    metrics::record_ingestion(
        start.elapsed().as_secs_f64(),
        chunks.len(),
        &processed.metadata.file_type,
    );

    info!(
        trace_id = %trace_id,
        doc_id = %doc_id,
        num_chunks = chunks.len(),
        "Document uploaded successfully"
    );

    Ok(Json(UploadDocumentResponse {
        doc_id,
        filename,
        file_type: processed.metadata.file_type,
        num_chunks: chunks.len(),
        message: "Document uploaded and indexed successfully".to_string(),
        trace_id,
    }))
}

#[derive(Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentSummary>,
}

/// List all uploaded documents
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<ListDocumentsResponse>> {
    let documents = state.store.list_documents().await?;
    Ok(Json(ListDocumentsResponse { documents }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Delete a specific document and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let documents = state.store.list_documents().await?;
    if !documents.iter().any(|d| d.doc_id == doc_id) {
        return Err(AppError::DocumentNotFound { id: doc_id });
    }

    state.store.delete_document(&doc_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Document {doc_id} deleted successfully"),
    }))
}

/// Clear all documents from the vector store
pub async fn clear_all_documents(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>> {
    let count = state.store.clear().await?;
    Ok(Json(MessageResponse {
        message: format!("Cleared {count} documents successfully"),
    }))
}

/// Check the file extension against the allowed list.
fn validate_extension(filename: &str, allowed: &[String]) -> Result<()> {
    let extension = std::path::Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() || !allowed.iter().any(|a| a == &extension) {
        return Err(AppError::UnsupportedFileType {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
            allowed: allowed.join(", "),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string(), "csv".to_string()]
    }

    #[test]
    fn test_validate_extension_accepts_allowed() {
        assert!(validate_extension("report.pdf", &allowed()).is_ok());
        assert!(validate_extension("NOTES.TXT", &allowed()).is_ok());
    }

    #[test]
    fn test_validate_extension_rejects_unknown() {
        assert!(validate_extension("slides.pptx", &allowed()).is_err());
        assert!(validate_extension("archive.tar.gz", &allowed()).is_err());
    }

    #[test]
    fn test_validate_extension_rejects_missing() {
        assert!(validate_extension("README", &allowed()).is_err());
    }
}
