//! DocAssist Ingestion
//!
//! Turns uploaded documents into indexed chunks:
//! - Per-format text extraction (PDF, TXT, CSV)
//! - Token-aware chunking with paragraph-preferred boundaries
//! - Content hashing for duplicate detection

pub mod chunker;
pub mod errors;
pub mod extract;
pub mod processor;

pub use chunker::TextChunker;
pub use errors::IngestionError;
pub use extract::ExtractedDocument;
pub use processor::DocumentProcessor;
