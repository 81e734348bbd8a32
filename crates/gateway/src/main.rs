//! DocAssist API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Document upload and ingestion
//! - Question answering through the agent pipeline
//! - Document management and data preview
//! - Observability (logging, metrics, tracing)

mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use docassist_common::{
    config::AppConfig,
    metrics,
    providers::{self, CompletionModel, Embedder},
    store::{InMemoryVectorStore, VectorStore},
};
use docassist_ingestion::{DocumentProcessor, TextChunker};
use docassist_pipeline::{AgentPipeline, PipelineOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn VectorStore>,
    pub pipeline: Arc<AgentPipeline>,
    pub processor: DocumentProcessor,
    pub chunker: TextChunker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting DocAssist API Gateway v{}", docassist_common::VERSION);
    info!(provider = %config.llm.provider, "LLM provider configured");

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!(addr = %metrics_addr, "Prometheus exporter listening");
    }

    // Wire up providers, vector store, and the answer pipeline
    let (embedder, completion): (Arc<dyn Embedder>, Arc<dyn CompletionModel>) =
        providers::create_providers(&config.llm);

    let store: Arc<dyn VectorStore> =
        Arc::new(InMemoryVectorStore::new("documents", embedder));

    let pipeline = Arc::new(AgentPipeline::with_options(
        store.clone(),
        completion,
        PipelineOptions {
            max_answer_tokens: config.pipeline.max_answer_tokens,
            temperature: config.pipeline.temperature,
        },
    ));

    let chunker = TextChunker::new(
        config.chunking.target_tokens,
        config.chunking.overlap_tokens,
    );

    // Uploads directory must exist before the first multipart request
    tokio::fs::create_dir_all(&config.upload.uploads_dir).await?;

    let state = AppState {
        config: config.clone(),
        store,
        pipeline,
        processor: DocumentProcessor::new(),
        chunker,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Uploads arrive as multipart bodies; leave headroom over the raw
    // file size limit for the multipart framing.
    let body_limit = state.config.max_upload_bytes() + 64 * 1024;

    // API routes
    let api_routes = Router::new()
        // Document endpoints
        .route("/upload-document", post(handlers::documents::upload_document))
        .route("/list-documents", get(handlers::documents::list_documents))
        .route(
            "/delete-document/{doc_id}",
            delete(handlers::documents::delete_document),
        )
        .route(
            "/clear-all-documents",
            post(handlers::documents::clear_all_documents),
        )
        // Question answering
        .route("/ask-question", post(handlers::questions::ask_question))
        // Tabular data preview
        .route(
            "/get-data-preview/{doc_id}",
            get(handlers::preview::get_data_preview),
        )
        // Health endpoint (no auth)
        .route("/health-check", get(handlers::health::health_check));

    // Compose the app
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
