//! Vector store abstraction
//!
//! The answer pipeline and the ingestion flow talk to the index through
//! the `VectorStore` trait; the backing implementation is opaque to them.
//! Ships with an in-memory cosine-similarity store backed by an injected
//! `Embedder`, sufficient for single-node deployments and tests.

use crate::errors::{AppError, Result};
use crate::models::{Chunk, DocumentMetadata, RetrievedChunk};
use crate::providers::Embedder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Statistics about an indexed collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub total_chunks: usize,
}

/// Summary of one indexed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub filename: String,
    pub file_type: String,
    pub chunks: usize,
    pub indexed_at: DateTime<Utc>,
}

/// Vector store interface consumed by ingestion and the answer pipeline.
///
/// `search` must return an empty sequence for "no results" rather than an
/// error; errors are reserved for transport/backend failures.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Index the chunks of one document under the given document id.
    async fn add_chunks(&self, chunks: &[Chunk], doc_id: &str) -> Result<()>;

    /// Retrieve the `top_k` most similar chunks for a query, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Collection statistics (total indexed chunk count).
    async fn stats(&self) -> Result<CollectionStats>;

    /// Return the doc_id of an already-indexed document with this file
    /// hash, if any.
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<String>>;

    /// List all unique indexed documents.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Delete all chunks for a document.
    async fn delete_document(&self, doc_id: &str) -> Result<()>;

    /// Delete everything; returns the number of chunks removed.
    async fn clear(&self) -> Result<usize>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;
}

/// One indexed chunk with its embedding.
#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    doc_id: String,
    chunk_id: usize,
    text: String,
    embedding: Vec<f32>,
    document: DocumentMetadata,
    indexed_at: DateTime<Utc>,
}

/// In-memory vector store with cosine-similarity ranking.
pub struct InMemoryVectorStore {
    collection_name: String,
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new(collection_name: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        let collection_name = collection_name.into();
        info!(collection = %collection_name, "Initialized in-memory vector store");
        Self {
            collection_name,
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_chunks(&self, chunks: &[Chunk], doc_id: &str) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::VectorStoreError {
                message: format!(
                    "Embedding count mismatch: {} embeddings for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let now = Utc::now();
        let mut store = self.chunks.write().await;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let mut document = chunk.metadata.clone().unwrap_or_default();
            document.doc_id = Some(doc_id.to_string());

            store.push(StoredChunk {
                id: format!("{}_{}", doc_id, chunk.chunk_id),
                doc_id: doc_id.to_string(),
                chunk_id: chunk.chunk_id,
                text: chunk.text.clone(),
                embedding,
                document,
                indexed_at: now,
            });
        }

        info!(doc_id = %doc_id, count = chunks.len(), "Added chunks to vector store");
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        let store = self.chunks.read().await;
        let mut scored: Vec<(f32, &StoredChunk)> = store
            .iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let results: Vec<RetrievedChunk> = scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| RetrievedChunk {
                id: chunk.id.clone(),
                doc_id: chunk.doc_id.clone(),
                chunk_id: chunk.chunk_id,
                text: chunk.text.clone(),
                score: score.clamp(0.0, 1.0),
                document: chunk.document.clone(),
            })
            .collect();

        debug!(query_len = query.len(), results = results.len(), "Search completed");
        Ok(results)
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let store = self.chunks.read().await;
        Ok(CollectionStats {
            collection_name: self.collection_name.clone(),
            total_chunks: store.len(),
        })
    }

    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<String>> {
        let store = self.chunks.read().await;
        Ok(store
            .iter()
            .find(|chunk| chunk.document.file_hash.as_deref() == Some(file_hash))
            .map(|chunk| chunk.doc_id.clone()))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let store = self.chunks.read().await;
        let mut documents: Vec<DocumentSummary> = Vec::new();

        for chunk in store.iter() {
            match documents.iter_mut().find(|d| d.doc_id == chunk.doc_id) {
                Some(summary) => summary.chunks += 1,
                None => documents.push(DocumentSummary {
                    doc_id: chunk.doc_id.clone(),
                    filename: chunk.document.filename.clone(),
                    file_type: chunk.document.file_type.clone(),
                    chunks: 1,
                    indexed_at: chunk.indexed_at,
                }),
            }
        }

        Ok(documents)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|chunk| chunk.doc_id != doc_id);
        info!(doc_id = %doc_id, removed = before - store.len(), "Deleted document");
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut store = self.chunks.write().await;
        let count = store.len();
        store.clear();
        info!(removed = count, "Cleared vector store");
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Cosine similarity between two vectors of the same dimension.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
