//! Per-format text extraction
//!
//! Turns uploaded files into plain text plus document metadata for the
//! chunker. Supports PDF (lopdf content-stream scan), plain text, and CSV
//! (rendered as an analysis report so tabular questions stay answerable).

use crate::errors::IngestionError;
use docassist_common::models::DocumentMetadata;
use std::path::Path;
use tracing::{debug, info, warn};

/// Row cap applied to CSV rendering to keep the text within token budgets.
const CSV_MAX_ROWS: usize = 50_000;

/// Rows shown in the CSV sample section.
const CSV_SAMPLE_ROWS: usize = 20;

/// Hard cap on rendered CSV text size.
const CSV_MAX_CHARS: usize = 100_000;

/// Extracted text and metadata for one document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Extract text from a PDF file.
///
/// Pages that fail to parse are skipped with a warning rather than
/// failing the whole document. A PDF with no extractable text (scanned
/// images, for example) yields empty text; the caller decides whether
/// that is an error.
pub fn extract_pdf(path: &Path) -> Result<ExtractedDocument, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    let num_pages = pages.len() as u32;
    let mut page_texts: Vec<String> = Vec::with_capacity(pages.len());

    debug!(page_count = num_pages, "Extracting text from PDF");

    for (page_num, page_id) in pages {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let raw = page_text_from_content(&content);
                page_texts.push(tidy_page_text(&raw));
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
                page_texts.push(String::new());
            }
        }
    }

    let pages_with_text = page_texts.iter().filter(|t| !t.is_empty()).count() as u32;
    let text = page_texts
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");
    let total_characters = text.chars().count();

    if total_characters == 0 {
        warn!(
            path = %path.display(),
            pages = num_pages,
            "PDF has no extractable text; may be scanned images"
        );
    } else {
        info!(
            pages = num_pages,
            pages_with_text,
            characters = total_characters,
            "Extracted text from PDF"
        );
    }

    Ok(ExtractedDocument {
        text,
        metadata: DocumentMetadata {
            num_pages: Some(num_pages),
            pages_with_text: Some(pages_with_text),
            total_characters: Some(total_characters),
            ..Default::default()
        },
    })
}

/// Pull text out of a PDF content stream.
///
/// Scans BT/ET text blocks for the Tj, TJ and quote show operators.
fn page_text_from_content(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content.lines() {
        let line = line.trim();
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                if !text.ends_with('\n') && !text.is_empty() {
                    text.push('\n');
                }
            }
            _ if in_text_block => {
                if let Some(shown) = text_from_show_operator(line) {
                    text.push_str(&shown);
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    text
}

/// Decode the string operand(s) of a text-showing operator, if `line`
/// ends in one.
fn text_from_show_operator(line: &str) -> Option<String> {
    let is_simple_show = line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"');
    let is_array_show = line.ends_with("TJ");
    if !is_simple_show && !is_array_show {
        return None;
    }

    // Both forms carry their text in (...) literals; array shows simply
    // carry several of them with kerning numbers between.
    let mut result = String::new();
    let mut current = String::new();
    let mut in_paren = false;
    let mut escaped = false;

    for c in line.chars() {
        if in_paren {
            if escaped {
                current.push(unescape_pdf_char(c));
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == ')' {
                in_paren = false;
                result.push_str(&current);
                current.clear();
            } else {
                current.push(c);
            }
        } else if c == '(' {
            in_paren = true;
        }
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

fn unescape_pdf_char(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    }
}

/// Strip empty lines and per-line padding while preserving line structure.
fn tidy_page_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract text from a plain-text file.
pub fn extract_txt(path: &Path) -> Result<ExtractedDocument, IngestionError> {
    let text = std::fs::read_to_string(path)?;
    info!(characters = text.chars().count(), "Extracted text from TXT file");

    Ok(ExtractedDocument {
        text,
        metadata: DocumentMetadata {
            num_pages: Some(1),
            ..Default::default()
        },
    })
}

/// Extract a CSV file as an analysis report.
///
/// Renders file metadata, per-column details with basic statistics, a
/// sample of leading rows, and the row data itself (capped), so questions
/// about the table remain answerable from retrieved text.
pub fn extract_csv(path: &Path) -> Result<ExtractedDocument, IngestionError> {
    let raw = std::fs::read_to_string(path)?;
    let mut records = parse_csv(&raw);

    if records.is_empty() {
        return Ok(ExtractedDocument {
            text: String::new(),
            metadata: DocumentMetadata {
                num_rows: Some(0),
                num_columns: Some(0),
                ..Default::default()
            },
        });
    }

    let header = records.remove(0);
    let num_columns = header.len();
    let num_rows = records.len();

    if records.len() > CSV_MAX_ROWS {
        records.truncate(CSV_MAX_ROWS);
    }

    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "=== CSV FILE METADATA ===\nTotal Rows: {}\nTotal Columns: {}\nColumn Names: {}\n",
        num_rows,
        num_columns,
        header.join(", ")
    ));

    sections.push(column_details(&header, &records));
    sections.push(sample_rows(&header, &records));
    sections.push(data_rows(&records, num_rows));

    let mut text = sections.join("\n");
    if text.chars().count() > CSV_MAX_CHARS {
        warn!(
            chars = text.chars().count(),
            cap = CSV_MAX_CHARS,
            "CSV rendering exceeds cap, truncating"
        );
        text = text.chars().take(CSV_MAX_CHARS).collect::<String>()
            + "\n\n[Content truncated due to size]";
    }

    info!(rows = num_rows, columns = num_columns, "Extracted CSV with analysis");

    Ok(ExtractedDocument {
        text,
        metadata: DocumentMetadata {
            num_rows: Some(num_rows),
            num_columns: Some(num_columns),
            ..Default::default()
        },
    })
}

/// Minimal CSV parser: comma-separated, double-quote quoting with `""`
/// escapes, one record per line. Also used by the data-preview endpoint.
pub fn parse_csv(raw: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
        fields.push(field);
        records.push(fields);
    }

    records
}

fn column_values<'a>(records: &'a [Vec<String>], index: usize) -> impl Iterator<Item = &'a str> {
    records
        .iter()
        .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
}

fn column_details(header: &[String], records: &[Vec<String>]) -> String {
    let mut details = String::from("=== COLUMN DETAILS ===\n");

    for (index, name) in header.iter().enumerate() {
        let non_null = column_values(records, index)
            .filter(|v| !v.trim().is_empty())
            .count();
        let null_count = records.len() - non_null;

        let numbers: Vec<f64> = column_values(records, index)
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .collect();
        let numeric = !numbers.is_empty() && numbers.len() == non_null;

        details.push_str(&format!(
            "\nColumn: {}\n  - Data Type: {}\n  - Non-Null Values: {}\n  - Null Values: {}\n",
            name,
            if numeric { "numeric" } else { "text" },
            non_null,
            null_count,
        ));

        if numeric {
            let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            details.push_str(&format!(
                "  - Min: {}\n  - Max: {}\n  - Mean: {:.2}\n",
                min, max, mean
            ));
        } else {
            let mut unique: Vec<&str> = column_values(records, index)
                .filter(|v| !v.trim().is_empty())
                .collect();
            unique.sort_unstable();
            unique.dedup();
            details.push_str(&format!("  - Unique Values: {}\n", unique.len()));
        }
    }

    details
}

fn sample_rows(header: &[String], records: &[Vec<String>]) -> String {
    let sample = records.len().min(CSV_SAMPLE_ROWS);
    let mut section = format!("\n=== SAMPLE DATA (First {} rows) ===\n", sample);
    section.push_str(&header.join(" | "));
    section.push('\n');
    for row in &records[..sample] {
        section.push_str(&row.join(" | "));
        section.push('\n');
    }
    section
}

fn data_rows(records: &[Vec<String>], total_rows: usize) -> String {
    let mut section = format!(
        "\n=== DATA ROWS ===\n(Showing first {} of {} rows)\n\n",
        records.len(),
        total_rows
    );
    for (i, row) in records.iter().enumerate() {
        section.push_str(&format!("Row {}: {}\n", i, row.join(", ")));
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tidy_page_text() {
        let input = "  Hello  \n\n   World \n";
        assert_eq!(tidy_page_text(input), "Hello\nWorld");
    }

    #[test]
    fn test_text_from_show_operator() {
        assert_eq!(
            text_from_show_operator("(Hello World) Tj").as_deref(),
            Some("Hello World")
        );
        assert_eq!(
            text_from_show_operator("[(Hel) -20 (lo)] TJ").as_deref(),
            Some("Hello")
        );
        assert_eq!(
            text_from_show_operator("(escaped \\(paren\\)) Tj").as_deref(),
            Some("escaped (paren)")
        );
        assert_eq!(text_from_show_operator("1 0 0 1 50 700 Tm"), None);
    }

    #[test]
    fn test_parse_csv_with_quotes() {
        let raw = "name,note\nalice,\"hello, world\"\nbob,\"say \"\"hi\"\"\"";
        let records = parse_csv(raw);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["alice", "hello, world"]);
        assert_eq!(records[2], vec!["bob", "say \"hi\""]);
    }

    #[test]
    fn test_extract_txt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "plain text body").unwrap();

        let extracted = extract_txt(file.path()).unwrap();
        assert_eq!(extracted.text, "plain text body");
        assert_eq!(extracted.metadata.num_pages, Some(1));
    }

    #[test]
    fn test_extract_csv_analysis() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "region,revenue\nnorth,100\nsouth,250\neast,\n"
        )
        .unwrap();

        let extracted = extract_csv(file.path()).unwrap();
        assert_eq!(extracted.metadata.num_rows, Some(3));
        assert_eq!(extracted.metadata.num_columns, Some(2));
        assert!(extracted.text.contains("=== CSV FILE METADATA ==="));
        assert!(extracted.text.contains("Column Names: region, revenue"));
        assert!(extracted.text.contains("Column: revenue"));
        assert!(extracted.text.contains("- Min: 100"));
        assert!(extracted.text.contains("- Max: 250"));
        assert!(extracted.text.contains("Row 1: south, 250"));
    }

    #[test]
    fn test_extract_csv_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let extracted = extract_csv(file.path()).unwrap();
        assert!(extracted.text.is_empty());
        assert_eq!(extracted.metadata.num_rows, Some(0));
    }

    #[test]
    fn test_extract_pdf_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not a pdf at all").unwrap();
        assert!(extract_pdf(file.path()).is_err());
    }
}
