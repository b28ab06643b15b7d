//! Google Gemini completion client
//!
//! Calls the `generateContent` endpoint with a single-part text prompt and
//! returns the concatenated text of the first candidate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::CompletionClient;
use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: CompletionConfig,
    client: Client,
}

/// Gemini API request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Gemini API response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiClient {
    /// Create a new Gemini client. An empty API key is accepted here and
    /// reported as an authentication failure on the first call.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            }),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.config.timeout_seconds)
        } else {
            CompletionError::Transport(e.to_string())
        }
    }

    fn fail_after(&self, started: Instant, e: reqwest::Error) -> CompletionError {
        let err = self.map_send_error(e);
        error!(
            "Gemini request failed after {} ms: {}",
            started.elapsed().as_millis(),
            err
        );
        err
    }

    fn map_status(status: StatusCode, body: String) -> CompletionError {
        let invalid_key = status == StatusCode::BAD_REQUEST
            && (body.contains("API_KEY_INVALID") || body.contains("API key not valid"));
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || invalid_key {
            CompletionError::Authentication(format!("HTTP {}", status.as_u16()))
        } else {
            CompletionError::Service {
                status: status.as_u16(),
                body,
            }
        }
    }

    fn extract_text(response_text: &str) -> Result<String, CompletionError> {
        let response: GeminiResponse = serde_json::from_str(response_text).map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            CompletionError::malformed(format!("unparseable response envelope: {}", e), response_text)
        })?;

        if let Some(usage) = &response.usage_metadata {
            info!(
                "Gemini API usage - Prompt: {:?} tokens, Response: {:?} tokens, Total: {:?} tokens",
                usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
            );
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            debug!("Gemini candidate had no text (finish reason {:?})", candidate.finish_reason);
            return Err(CompletionError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if self.config.api_key.trim().is_empty() {
            return Err(CompletionError::Authentication(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }

        let url = self.endpoint();
        debug!("Sending request to Gemini API: {} ({} prompt chars)", url, prompt.chars().count());

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.fail_after(started, e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| self.fail_after(started, e))?;
        let elapsed = started.elapsed();

        if !status.is_success() {
            error!(
                "Gemini API error: {} after {} ms - {}",
                status,
                elapsed.as_millis(),
                response_text
            );
            return Err(Self::map_status(status, response_text));
        }

        info!(
            "Gemini completion from {} took {} ms",
            self.config.model,
            elapsed.as_millis()
        );

        Self::extract_text(&response_text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}
