//! Embedding and completion provider abstraction
//!
//! Provides unified interfaces over the two external model services the
//! system depends on:
//! - `Embedder` for vector embeddings (OpenAI-compatible API or a local
//!   deterministic hashing embedder)
//! - `CompletionModel` for answer generation (OpenAI-compatible chat API
//!   or a canned local responder for development)

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Trait for text completion generation
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// `temperature` is clamped to [0, 1] by implementations.
    async fn generate(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible implementations
// ---------------------------------------------------------------------------

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI embedding client
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: String,
        dimension: usize,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            model,
            dimension,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingsRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingsResponse =
            response.json().await.map_err(|e| AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingError {
                message: "Empty response".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The embeddings endpoint caps inputs per request
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request(batch).await?;
            all_embeddings.extend(embeddings);
        }
        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI chat-completion client
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Deserialize)]
struct ChatMessageContent {
    content: String,
}

impl OpenAiCompletion {
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            model,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletion {
    async fn generate(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature: temperature.clamp(0.0, 1.0),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::CompletionError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CompletionError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: ChatResponse =
            response.json().await.map_err(|e| AppError::CompletionError {
                message: format!("Failed to parse response: {}", e),
            })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::CompletionError {
                message: "Empty response from completion API".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Local implementations (development and tests)
// ---------------------------------------------------------------------------

/// Deterministic local embedder using feature hashing.
///
/// Tokenizes on non-alphanumeric boundaries, hashes each lowercased term
/// into a fixed-dimension bucket, and L2-normalizes the result. Identical
/// texts always produce identical vectors, which makes cosine ranking in
/// the in-memory store stable without a model dependency.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            term.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hashing-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Canned completion model for development and tests.
///
/// Echoes the question back in a grounded-sounding answer with source
/// notation so the full pipeline can run without an API key.
pub struct StaticCompletion;

#[async_trait]
impl CompletionModel for StaticCompletion {
    async fn generate(
        &self,
        prompt: &str,
        _max_tokens: usize,
        _temperature: f32,
    ) -> Result<String> {
        // Pull the question line back out of the prompt, if present.
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("your question")
            .trim();

        Ok(format!(
            "Based on the provided context, here is what the documents say about {}: \
             the most relevant passages are summarized in [Source 1]. \
             [Canned response - no completion API key configured]",
            question
        ))
    }

    fn model_name(&self) -> &str {
        "static-completion"
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the embedding and completion providers from configuration.
///
/// Falls back to the local providers when the configured provider is
/// unknown or the API key is missing.
pub fn create_providers(config: &LlmConfig) -> (Arc<dyn Embedder>, Arc<dyn CompletionModel>) {
    match (config.provider.as_str(), config.api_key.as_deref()) {
        ("openai", Some(key)) if !key.is_empty() => {
            let embedder = OpenAiEmbedder::new(
                key.to_string(),
                config.embedding_model.clone(),
                config.embedding_dimension,
                config.api_base.clone(),
                config.timeout_secs,
            );
            let completion = OpenAiCompletion::new(
                key.to_string(),
                config.completion_model.clone(),
                config.api_base.clone(),
                config.timeout_secs,
            );
            match (embedder, completion) {
                (Ok(e), Ok(c)) => return (Arc::new(e), Arc::new(c)),
                _ => {
                    tracing::warn!("Failed to build OpenAI providers, using local fallback");
                }
            }
        }
        ("openai", _) => {
            tracing::warn!("LLM provider is openai but no API key is set, using local fallback");
        }
        ("local", _) => {}
        (other, _) => {
            tracing::warn!(provider = other, "Unknown LLM provider, using local fallback");
        }
    }

    (
        Arc::new(HashingEmbedder::new(config.embedding_dimension)),
        Arc::new(StaticCompletion),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("quarterly revenue report").await.unwrap();
        let b = embedder.embed("quarterly revenue report").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_hashing_embedder_normalizes() {
        let embedder = HashingEmbedder::new(32);
        let v = embedder.embed("one two three four").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_embedder_empty_text() {
        let embedder = HashingEmbedder::new(32);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_hashing_embedder_batch() {
        let embedder = HashingEmbedder::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn test_static_completion_echoes_question() {
        let model = StaticCompletion;
        let prompt = "Context here\n\nQuestion: What is the total revenue?\n\nAnswer:";
        let answer = model.generate(prompt, 500, 0.3).await.unwrap();
        assert!(answer.contains("What is the total revenue?"));
        assert!(answer.len() >= 20);
    }

    #[test]
    fn test_factory_falls_back_without_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key: None,
            api_base: None,
            completion_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 256,
            timeout_secs: 30,
        };
        let (embedder, completion) = create_providers(&config);
        assert_eq!(embedder.model_name(), "hashing-embedder");
        assert_eq!(completion.model_name(), "static-completion");
    }
}
