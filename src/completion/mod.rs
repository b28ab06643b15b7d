//! Completion client abstraction
//!
//! The single network boundary of the pipeline. [`CompletionClient`] is the
//! seam the advisor depends on, so tests and alternative providers can stand
//! in for Gemini.

use async_trait::async_trait;

use crate::error::CompletionError;

pub mod gemini;

pub use gemini::GeminiClient;

/// Sends a rendered prompt to a generative model and returns its raw text
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}
