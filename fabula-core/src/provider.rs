//! Model-provider interfaces and their Ollama implementations.
//!
//! The narrator and similarity engine talk to the model through these
//! two traits so tests can script them without a server.

use async_trait::async_trait;
use ollama::{GenerateOptions, GenerateRequest, Ollama};
use thiserror::Error;

/// Error from a completion provider.
#[derive(Debug, Error)]
#[error("Completion service error: {0}")]
pub struct CompletionError(pub String);

/// Error from an embedding provider.
#[derive(Debug, Error)]
#[error("Embedding service error: {0}")]
pub struct EmbeddingError(pub String);

/// Sampling parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub repeat_penalty: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub stop: Vec<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.9,
            max_tokens: 2048,
            repeat_penalty: 1.1,
            presence_penalty: 0.7,
            frequency_penalty: 0.7,
            stop: Vec::new(),
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// A text-embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
impl CompletionClient for Ollama {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let request = GenerateRequest::new(prompt).with_options(
            GenerateOptions::default()
                .with_temperature(options.temperature)
                .with_top_p(options.top_p)
                .with_num_predict(options.max_tokens)
                .with_repeat_penalty(options.repeat_penalty)
                .with_presence_penalty(options.presence_penalty)
                .with_frequency_penalty(options.frequency_penalty)
                .with_stop(options.stop.clone()),
        );

        let response = self
            .generate(request)
            .await
            .map_err(|e| CompletionError(e.to_string()))?;

        Ok(response.text)
    }
}

#[async_trait]
impl Embedder for Ollama {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ollama::embed(self, text)
            .await
            .map_err(|e| EmbeddingError(e.to_string()))
    }
}
