//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the DocAssist services.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DocAssist metrics
pub const METRICS_PREFIX: &str = "docassist";

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Question pipeline metrics
    describe_counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions processed by the answer pipeline"
    );

    describe_histogram!(
        format!("{}_question_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Answer pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_pipeline_short_circuits_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline runs that exited early, labeled by safety flag"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    // Provider metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one completed pipeline run.
pub fn record_question(duration_secs: f64, confidence: &str, short_circuit: Option<&str>) {
    counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        "confidence" => confidence.to_string()
    )
    .increment(1);

    histogram!(format!("{}_question_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if let Some(flag) = short_circuit {
        counter!(
            format!("{}_pipeline_short_circuits_total", METRICS_PREFIX),
            "flag" => flag.to_string()
        )
        .increment(1);
    }
}

/// Record one completed document ingestion.
pub fn record_ingestion(duration_secs: f64, chunks_created: usize, file_type: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "file_type" => file_type.to_string()
    )
    .increment(1);

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/api/v1/ask-question");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers() {
        record_question(0.12, "high", None);
        record_question(0.01, "low", Some("prompt_injection"));
        record_ingestion(0.5, 12, ".pdf");
    }
}
