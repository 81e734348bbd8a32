//! Tabular data preview handler
//!
//! Serves a structured preview of uploaded CSV files straight from the
//! uploads directory, with per-column type guesses and basic statistics.

use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use docassist_common::errors::{AppError, Result};
use docassist_ingestion::extract::parse_csv;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    #[serde(default = "default_num_rows")]
    pub num_rows: usize,
}

fn default_num_rows() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct DataPreviewResponse {
    pub doc_id: String,
    pub filename: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub preview_rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
    pub null: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_values: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Get a tabular preview of CSV data
pub async fn get_data_preview(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<DataPreviewResponse>> {
    // Resolve the document's filename from the index.
    let documents = state.store.list_documents().await?;
    let doc = documents
        .into_iter()
        .find(|d| d.doc_id == doc_id)
        .ok_or_else(|| AppError::DocumentNotFound { id: doc_id.clone() })?;

    if doc.file_type != ".csv" {
        return Err(AppError::Validation {
            message: format!(
                "Data preview only supported for CSV files, got {}",
                doc.file_type
            ),
            field: Some("doc_id".to_string()),
        });
    }

    let file_path = std::path::Path::new(&state.config.upload.uploads_dir).join(&doc.filename);
    if !file_path.exists() {
        return Err(AppError::NotFound {
            resource_type: "source file".to_string(),
            id: doc.filename.clone(),
        });
    }

    let raw = tokio::fs::read_to_string(&file_path).await?;
    let mut records = parse_csv(&raw);
    if records.is_empty() {
        return Err(AppError::EmptyDocument {
            filename: doc.filename,
        });
    }

    let header = records.remove(0);
    let total_rows = records.len();
    let total_columns = header.len();

    let columns = column_info(&header, &records);

    // Row records as {column: value} objects.
    let preview = &records[..records.len().min(params.num_rows)];
    let data: Vec<serde_json::Value> = preview
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = header
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = row.get(i).map(String::as_str).unwrap_or("");
                    (name.clone(), cell_to_json(value))
                })
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    Ok(Json(DataPreviewResponse {
        doc_id,
        filename: doc.filename,
        total_rows,
        total_columns,
        preview_rows: data.len(),
        columns,
        data,
    }))
}

/// Render numeric-looking cells as JSON numbers, everything else as
/// strings; empty cells become null.
fn cell_to_json(value: &str) -> serde_json::Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        if let Some(json_number) = serde_json::Number::from_f64(number) {
            return serde_json::Value::Number(json_number);
        }
    }
    serde_json::Value::String(value.to_string())
}

fn column_info(header: &[String], records: &[Vec<String>]) -> Vec<ColumnInfo> {
    header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values: Vec<&str> = records
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect();

            let non_null = values.iter().filter(|v| !v.trim().is_empty()).count();
            let null = values.len() - non_null;

            let numbers: Vec<f64> = values
                .iter()
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect();
            let numeric = !numbers.is_empty() && numbers.len() == non_null;

            let (stats, unique_values) = if numeric {
                let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                (Some(NumericStats { min, max, mean }), None)
            } else {
                let mut unique: Vec<&str> = values
                    .iter()
                    .filter(|v| !v.trim().is_empty())
                    .copied()
                    .collect();
                unique.sort_unstable();
                unique.dedup();
                (None, Some(unique.len()))
            };

            ColumnInfo {
                name: name.clone(),
                dtype: if numeric { "numeric" } else { "text" }.to_string(),
                non_null,
                null,
                stats,
                unique_values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_json() {
        assert_eq!(cell_to_json("42"), serde_json::json!(42.0));
        assert_eq!(cell_to_json("hello"), serde_json::json!("hello"));
        assert_eq!(cell_to_json("  "), serde_json::Value::Null);
    }

    #[test]
    fn test_column_info_numeric_and_text() {
        let header = vec!["region".to_string(), "revenue".to_string()];
        let records = vec![
            vec!["north".to_string(), "100".to_string()],
            vec!["south".to_string(), "300".to_string()],
            vec!["north".to_string(), String::new()],
        ];

        let columns = column_info(&header, &records);

        assert_eq!(columns[0].dtype, "text");
        assert_eq!(columns[0].unique_values, Some(2));
        assert_eq!(columns[0].non_null, 3);

        assert_eq!(columns[1].dtype, "numeric");
        assert_eq!(columns[1].null, 1);
        let stats = columns[1].stats.as_ref().unwrap();
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.mean, 200.0);
    }
}
