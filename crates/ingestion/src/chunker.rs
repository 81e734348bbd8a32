//! Token-aware text chunking
//!
//! Splits extracted document text into overlapping, retrieval-sized
//! segments, preferring paragraph boundaries. Token counts are estimated
//! at ~4 characters per token; there is no tokenizer dependency. Pure
//! function of (text, metadata, config) — no I/O.

use docassist_common::models::{Chunk, DocumentMetadata};
use docassist_common::CHARS_PER_TOKEN;
use tracing::debug;

/// Chunks text into overlapping segments sized near a token budget.
#[derive(Debug, Clone)]
pub struct TextChunker {
    target_tokens: usize,
    target_chars: usize,
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// `target_tokens`: target chunk size in tokens (400-600 recommended).
    /// `overlap_tokens`: overlap between chunks (10-20% of target).
    pub fn new(target_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            target_tokens,
            target_chars: target_tokens * CHARS_PER_TOKEN,
            overlap_chars: overlap_tokens * CHARS_PER_TOKEN,
        }
    }

    /// Estimate the number of tokens in text.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count() / CHARS_PER_TOKEN
    }

    /// Split text at paragraph boundaries: blank lines, or a newline
    /// followed by an indented line (two or more leading whitespace chars).
    pub fn split_paragraphs(text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current = String::new();

        for line in text.split('\n') {
            if line.trim().is_empty() {
                flush_paragraph(&mut current, &mut paragraphs);
                continue;
            }

            let indented = line.chars().take_while(|c| c.is_whitespace()).count() >= 2;
            if indented {
                flush_paragraph(&mut current, &mut paragraphs);
            }

            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        flush_paragraph(&mut current, &mut paragraphs);

        paragraphs
    }

    /// Split a paragraph at sentence boundaries: `.`, `!` or `?` followed
    /// by whitespace. The separating whitespace is consumed.
    fn split_sentences(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
                while chars.peek().is_some_and(|n| n.is_whitespace()) {
                    chars.next();
                }
                sentences.push(std::mem::take(&mut current));
            }
        }
        if !current.trim().is_empty() {
            sentences.push(current);
        }

        sentences
    }

    /// Chunk text with overlap, preferring paragraph boundaries.
    ///
    /// Paragraphs are accumulated greedily up to the target size; the last
    /// paragraph of a flushed chunk seeds the next one only when it fits
    /// the overlap budget, so a single oversized paragraph can never grow
    /// the overlap unboundedly. Paragraphs estimated over 1.5x the target
    /// are split internally at sentence boundaries instead, with the last
    /// sentence always carried over. The final partial buffer is always
    /// flushed, and positions advance by the emitted chunk text.
    pub fn chunk_text(&self, text: &str, metadata: Option<&DocumentMetadata>) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut paragraphs = Self::split_paragraphs(text);
        if paragraphs.is_empty() {
            paragraphs = vec![text.to_string()];
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut buffer: Vec<String> = Vec::new();
        let mut buffer_chars = 0usize;
        let mut chunk_id = 0usize;
        let mut start_pos = 0usize;

        // Detailed metadata banner opens the first chunk.
        if let Some(meta) = metadata {
            let banner = metadata_banner(meta);
            buffer_chars += banner.chars().count();
            buffer.push(banner);
        }

        for paragraph in paragraphs {
            let para_chars = paragraph.chars().count();
            let oversized =
                self.estimate_tokens(&paragraph) as f64 > self.target_tokens as f64 * 1.5;

            if oversized {
                // Flush whatever is buffered; the oversized paragraph is
                // handled at sentence granularity on its own.
                if !buffer.is_empty() {
                    let chunk = self.create_chunk(buffer.join("\n\n"), chunk_id, start_pos, metadata);
                    start_pos += chunk.char_count;
                    chunks.push(chunk);
                    chunk_id += 1;
                    buffer.clear();
                    buffer_chars = 0;
                }

                let mut sentence_buffer: Vec<String> = Vec::new();
                let mut sentence_chars = 0usize;

                for sentence in Self::split_sentences(&paragraph) {
                    let chars = sentence.chars().count();
                    if sentence_chars + chars > self.target_chars && !sentence_buffer.is_empty() {
                        let chunk = self.create_chunk(
                            sentence_buffer.join(" "),
                            chunk_id,
                            start_pos,
                            metadata,
                        );
                        start_pos += chunk.char_count;
                        chunks.push(chunk);
                        chunk_id += 1;

                        // Overlap: carry the last sentence forward.
                        if self.overlap_chars > 0 {
                            let last = sentence_buffer
                                .pop()
                                .expect("flushed sentence buffer is non-empty");
                            sentence_chars = last.chars().count();
                            sentence_buffer = vec![last];
                        } else {
                            sentence_buffer.clear();
                            sentence_chars = 0;
                        }
                    }
                    sentence_chars += chars;
                    sentence_buffer.push(sentence);
                }

                if !sentence_buffer.is_empty() {
                    let chunk =
                        self.create_chunk(sentence_buffer.join(" "), chunk_id, start_pos, metadata);
                    start_pos += chunk.char_count;
                    chunks.push(chunk);
                    chunk_id += 1;
                }
            } else {
                if buffer_chars + para_chars > self.target_chars && !buffer.is_empty() {
                    let chunk = self.create_chunk(buffer.join("\n\n"), chunk_id, start_pos, metadata);
                    start_pos += chunk.char_count;
                    chunks.push(chunk);
                    chunk_id += 1;

                    // Overlap: keep the last paragraph only if it fits the
                    // overlap budget.
                    let last = buffer.pop().expect("flushed buffer is non-empty");
                    let last_chars = last.chars().count();
                    if self.overlap_chars > 0 && last_chars <= self.overlap_chars {
                        buffer = vec![last];
                        buffer_chars = last_chars;
                    } else {
                        buffer.clear();
                        buffer_chars = 0;
                    }
                }

                buffer_chars += para_chars;
                buffer.push(paragraph);
            }
        }

        // Final partial buffer is always flushed.
        if !buffer.is_empty() {
            let chunk = self.create_chunk(buffer.join("\n\n"), chunk_id, start_pos, metadata);
            chunks.push(chunk);
        }

        debug!(chunk_count = chunks.len(), "Created chunks from text");
        chunks
    }

    /// Assemble one chunk with positional bookkeeping and metadata.
    fn create_chunk(
        &self,
        text: String,
        chunk_id: usize,
        start_pos: usize,
        metadata: Option<&DocumentMetadata>,
    ) -> Chunk {
        // Later chunks carry a brief document reference for retrieval;
        // the first chunk already opens with the full banner.
        let text = match metadata {
            Some(meta) if chunk_id > 0 && !meta.filename.is_empty() && meta.num_pages.is_some() => {
                format!(
                    "[Document: {} | Total Pages: {}]\n\n{}",
                    meta.filename,
                    meta.num_pages.unwrap_or_default(),
                    text
                )
            }
            _ => text,
        };

        let char_count = text.chars().count();
        Chunk {
            chunk_id,
            start_pos,
            end_pos: start_pos + char_count,
            token_count: char_count / CHARS_PER_TOKEN,
            char_count,
            text,
            metadata: metadata.cloned(),
        }
    }
}

fn flush_paragraph(current: &mut String, paragraphs: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
    current.clear();
}

/// Human-readable document metadata banner placed at the top of the first
/// chunk.
fn metadata_banner(meta: &DocumentMetadata) -> String {
    let mut lines = vec!["=== DOCUMENT METADATA ===".to_string()];
    if !meta.filename.is_empty() {
        lines.push(format!("Filename: {}", meta.filename));
    }
    if !meta.file_type.is_empty() {
        lines.push(format!("File Type: {}", meta.file_type));
    }
    if let Some(num_pages) = meta.num_pages {
        lines.push(format!("Total Pages: {}", num_pages));
    }
    if let Some(pages_with_text) = meta.pages_with_text {
        lines.push(format!("Pages with Text: {}", pages_with_text));
    }
    if let Some(total_characters) = meta.total_characters {
        lines.push(format!("Total Characters: {}", total_characters));
    }
    lines.push("=== END METADATA ===\n".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> TextChunker {
        TextChunker::new(100, 10)
    }

    fn test_metadata() -> DocumentMetadata {
        DocumentMetadata {
            filename: "report.pdf".into(),
            file_type: ".pdf".into(),
            num_pages: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_estimate_tokens() {
        let chunker = chunker();
        assert_eq!(chunker.estimate_tokens("abcdefgh"), 2);
        assert_eq!(chunker.estimate_tokens(""), 0);
    }

    #[test]
    fn test_split_paragraphs_on_blank_lines() {
        let text = "Paragraph one.\n\nParagraph two.\n\nParagraph three.";
        let paragraphs = TextChunker::split_paragraphs(text);
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0], "Paragraph one.");
        assert_eq!(paragraphs[1], "Paragraph two.");
    }

    #[test]
    fn test_split_paragraphs_on_indentation() {
        let text = "Heading line\n    indented continuation starts a new paragraph";
        let paragraphs = TextChunker::split_paragraphs(text);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], "Heading line");
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = chunker();
        assert!(chunker.chunk_text("", None).is_empty());
        assert!(chunker.chunk_text("   ", None).is_empty());
        assert!(chunker.chunk_text("\n\n\t\n", None).is_empty());
    }

    #[test]
    fn test_single_short_paragraph_is_one_chunk() {
        let chunker = chunker();
        let chunks = chunker.chunk_text("This is a short test text.", None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, 0);
        assert_eq!(chunks[0].text, "This is a short test text.");
        assert_eq!(chunks[0].start_pos, 0);
        assert_eq!(chunks[0].end_pos, chunks[0].char_count);
        assert_eq!(chunks[0].token_count, chunks[0].char_count / 4);
    }

    #[test]
    fn test_long_text_produces_sequential_ids() {
        let chunker = chunker();
        let text = vec!["This is a test paragraph with some words in it."; 40].join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i);
        }
    }

    #[test]
    fn test_positions_are_contiguous_and_monotonic() {
        let chunker = chunker();
        let text = vec!["Some sentence that repeats to force multiple chunks."; 40].join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        assert!(chunks.len() > 1);
        let mut expected_start = 0;
        for chunk in &chunks {
            assert_eq!(chunk.start_pos, expected_start);
            assert_eq!(chunk.end_pos, chunk.start_pos + chunk.char_count);
            expected_start = chunk.end_pos;
        }
    }

    #[test]
    fn test_chunk_size_bound_for_normal_paragraphs() {
        let chunker = TextChunker::new(100, 10);
        let paragraph = "A paragraph of about eighty characters used to fill the working buffer.";
        let text = vec![paragraph; 50].join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        // Flush happens before exceeding the target, so no chunk can grow
        // past target_chars plus one paragraph's overrun.
        let bound = 100 * 4 + paragraph.len();
        for chunk in &chunks {
            assert!(chunk.char_count <= bound, "chunk too large: {}", chunk.char_count);
        }
    }

    #[test]
    fn test_overlap_carries_last_paragraph_when_small_enough() {
        // overlap budget: 20 tokens -> 80 chars; paragraphs ~60 chars fit.
        let chunker = TextChunker::new(50, 20);
        let paragraphs: Vec<String> = (0..12)
            .map(|i| format!("Paragraph number {i} padded with several extra words here."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail = pair[0].text.rsplit("\n\n").next().unwrap();
            assert!(
                pair[1].text.starts_with(tail),
                "expected overlap, next chunk starts with {:?}",
                &pair[1].text[..tail.len().min(pair[1].text.len())]
            );
        }
    }

    #[test]
    fn test_no_overlap_when_trailing_paragraph_exceeds_budget() {
        // overlap budget: 5 tokens -> 20 chars; every paragraph is larger.
        let chunker = TextChunker::new(50, 5);
        let paragraphs: Vec<String> = (0..10)
            .map(|i| format!("Paragraph number {i} padded with several extra words here."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail = pair[0].text.rsplit("\n\n").next().unwrap();
            assert!(!pair[1].text.starts_with(tail));
        }
    }

    #[test]
    fn test_oversized_paragraph_splits_by_sentences() {
        let chunker = TextChunker::new(20, 5);
        // One paragraph, far over 1.5x the target, many sentences.
        let text = vec!["This sentence pads out an oversized paragraph."; 20].join(" ");
        assert!(chunker.estimate_tokens(&text) > 30);

        let chunks = chunker.chunk_text(&text, None);
        assert!(chunks.len() > 1);

        // Sub-chunk overlap is the last sentence of the previous chunk.
        for pair in chunks.windows(2) {
            let tail = pair[0].text.rsplit(". ").next().unwrap();
            assert!(pair[1].text.starts_with(tail.trim_start()));
        }
    }

    #[test]
    fn test_coverage_no_content_lost() {
        let chunker = TextChunker::new(50, 10);
        let paragraphs: Vec<String> = (0..15)
            .map(|i| format!("Unique paragraph {i} with distinct trailing content token{i}."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunker.chunk_text(&text, None);

        let combined: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        for paragraph in &paragraphs {
            assert!(combined.contains(paragraph), "lost: {paragraph}");
        }
    }

    #[test]
    fn test_final_partial_buffer_is_flushed() {
        let chunker = TextChunker::new(100, 10);
        // Total length is not a multiple of target_chars; the tail must
        // still come out.
        let text = format!(
            "{}\n\nThe final trailing paragraph must not be lost.",
            vec!["Filler paragraph with enough words to occupy space."; 20].join("\n\n")
        );
        let chunks = chunker.chunk_text(&text, None);
        assert!(chunks
            .last()
            .unwrap()
            .text
            .contains("The final trailing paragraph must not be lost."));
    }

    #[test]
    fn test_metadata_banner_on_first_chunk() {
        let chunker = chunker();
        let metadata = test_metadata();
        let chunks = chunker.chunk_text("Some document body text.", Some(&metadata));

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("=== DOCUMENT METADATA ==="));
        assert!(chunks[0].text.contains("Filename: report.pdf"));
        assert!(chunks[0].text.contains("Total Pages: 3"));
        assert!(chunks[0].text.contains("Some document body text."));
        assert_eq!(chunks[0].metadata.as_ref().unwrap().filename, "report.pdf");
    }

    #[test]
    fn test_brief_reference_on_later_chunks() {
        let chunker = TextChunker::new(50, 5);
        let metadata = test_metadata();
        let text = vec!["A paragraph with enough words to spill over chunks."; 20].join("\n\n");
        let chunks = chunker.chunk_text(&text, Some(&metadata));

        assert!(chunks.len() > 1);
        assert!(chunks[0].text.starts_with("=== DOCUMENT METADATA ==="));
        for chunk in &chunks[1..] {
            assert!(chunk
                .text
                .starts_with("[Document: report.pdf | Total Pages: 3]"));
            assert_eq!(chunk.metadata.as_ref().unwrap().num_pages, Some(3));
        }
    }

    #[test]
    fn test_metadata_attached_to_every_chunk() {
        let chunker = TextChunker::new(50, 5);
        let metadata = test_metadata();
        let text = vec!["Yet another paragraph used to force several chunks."; 20].join("\n\n");
        let chunks = chunker.chunk_text(&text, Some(&metadata));

        for chunk in &chunks {
            assert_eq!(chunk.metadata.as_ref().map(|m| m.filename.as_str()), Some("report.pdf"));
        }
    }
}
