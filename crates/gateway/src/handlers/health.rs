//! Health check handler

use crate::AppState;
use axum::{extract::State, Json};
use docassist_common::models::HealthCheckResponse;

/// Check API and vector store health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let connected = state.store.ping().await.is_ok();

    let collection_stats = match state.store.stats().await {
        Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
        Err(e) => {
            tracing::error!(error = %e, "Health check stats lookup failed");
            serde_json::Value::Object(Default::default())
        }
    };

    Json(HealthCheckResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        vector_store_connected: connected,
        collection_stats,
    })
}
