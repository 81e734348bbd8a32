//! Domain and API models shared across DocAssist services

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Document-level metadata attached to every chunk of a document.
///
/// `doc_id` is assigned by the ingestion flow after chunking; the chunker
/// itself never sets it. Format-specific fields are populated by the
/// matching extractor and left `None` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_with_text: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_characters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sheets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_paragraphs: Option<usize>,
}

/// A contiguous text segment produced by the chunker.
///
/// Chunks are created in a single batch per document, immutable once
/// created, and handed to the vector store by the ingestion flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequence number, unique within one document, assigned in emission
    /// order starting at 0.
    pub chunk_id: usize,
    /// Segment text, optionally prefixed with a document-metadata banner.
    pub text: String,
    /// Character offset into the concatenation of emitted chunk texts.
    pub start_pos: usize,
    /// `start_pos + char_count`.
    pub end_pos: usize,
    /// Estimated token count (characters / 4).
    pub token_count: usize,
    /// Character count of `text`.
    pub char_count: usize,
    /// Full document metadata, when supplied at chunking time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

/// A chunk as returned by vector search, with its similarity score.
///
/// Ephemeral: exists only for the duration of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Store identifier (`{doc_id}_{chunk_id}`).
    pub id: String,
    pub doc_id: String,
    pub chunk_id: usize,
    pub text: String,
    /// Similarity in [0, 1], higher is better.
    pub score: f32,
    pub document: DocumentMetadata,
}

/// Coarse answer-quality signal attached to every pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Citation information for a source chunk that survived validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<u32>,
    pub chunk_id: usize,
    /// Similarity score rounded to 3 decimals.
    pub score: f64,
}

impl Citation {
    /// Build a citation from a retrieved chunk, rounding the score.
    pub fn from_retrieved(chunk: &RetrievedChunk) -> Self {
        Self {
            doc_id: chunk.doc_id.clone(),
            filename: chunk.document.filename.clone(),
            page: chunk.document.num_pages,
            sheet: chunk.document.num_sheets,
            chunk_id: chunk.chunk_id,
            score: round3(chunk.score as f64),
        }
    }
}

/// Round to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Terminal output of one question-answering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: Confidence,
    pub safety_flags: Vec<String>,
    pub reasoning: String,
}

/// Answer style requested by the caller.
///
/// Unrecognized styles fall back to `Clear` rather than failing the
/// request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AnswerStyle {
    #[default]
    Concise,
    Detailed,
    Bullet,
    Clear,
}

impl From<String> for AnswerStyle {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "concise" => AnswerStyle::Concise,
            "detailed" => AnswerStyle::Detailed,
            "bullet" => AnswerStyle::Bullet,
            _ => AnswerStyle::Clear,
        }
    }
}

impl AnswerStyle {
    /// Prompt instruction for this style.
    pub fn instruction(&self) -> &'static str {
        match self {
            AnswerStyle::Concise => "Provide a brief, direct answer.",
            AnswerStyle::Detailed => "Provide a comprehensive, detailed answer.",
            AnswerStyle::Bullet => "Provide the answer as bullet points.",
            AnswerStyle::Clear => "Provide a clear answer.",
        }
    }
}

// ---------------------------------------------------------------------------
// API request/response models
// ---------------------------------------------------------------------------

/// Request model for asking a question
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AskQuestionRequest {
    /// The question to ask
    #[validate(length(min = 1, max = 1000))]
    pub question: String,

    /// Number of chunks to retrieve
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 20))]
    pub top_k: usize,

    /// Answer style: concise, detailed, or bullet
    #[serde(default)]
    pub answer_style: AnswerStyle,

    /// Whether to include citations
    #[serde(default = "default_true")]
    pub include_citations: bool,
}

fn default_top_k() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Response model for question answering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskQuestionResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Confidence level: high, medium, or low
    pub confidence: Confidence,
    pub safety_flags: Vec<String>,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Response model for document upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDocumentResponse {
    pub doc_id: String,
    pub filename: String,
    pub file_type: String,
    pub num_chunks: usize,
    pub message: String,
    pub trace_id: String,
}

/// Response model for health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub vector_store_connected: bool,
    pub collection_stats: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Confidence::High).unwrap(),
            "\"high\""
        );
        assert_eq!(Confidence::Medium.to_string(), "medium");
    }

    #[test]
    fn test_answer_style_fallback() {
        let style: AnswerStyle = serde_json::from_str("\"bullet\"").unwrap();
        assert_eq!(style, AnswerStyle::Bullet);

        // Unknown styles degrade to the clear-answer instruction.
        let style: AnswerStyle = serde_json::from_str("\"academic\"").unwrap();
        assert_eq!(style, AnswerStyle::Clear);
        assert_eq!(style.instruction(), "Provide a clear answer.");
    }

    #[test]
    fn test_citation_from_retrieved_rounds_score() {
        let chunk = RetrievedChunk {
            id: "doc1_3".into(),
            doc_id: "doc1".into(),
            chunk_id: 3,
            text: "some text".into(),
            score: 0.87654,
            document: DocumentMetadata {
                filename: "report.pdf".into(),
                file_type: ".pdf".into(),
                num_pages: Some(12),
                ..Default::default()
            },
        };

        let citation = Citation::from_retrieved(&chunk);
        assert_eq!(citation.filename, "report.pdf");
        assert_eq!(citation.page, Some(12));
        assert_eq!(citation.sheet, None);
        assert_eq!(citation.score, 0.877);
    }

    #[test]
    fn test_ask_question_request_defaults() {
        let request: AskQuestionRequest =
            serde_json::from_str(r#"{"question": "What is the revenue?"}"#).unwrap();
        assert_eq!(request.top_k, 5);
        assert_eq!(request.answer_style, AnswerStyle::Concise);
        assert!(request.include_citations);
    }
}
