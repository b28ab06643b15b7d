//! Environment-driven configuration
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binaries via `dotenvy`). Every setting has a default except the API key.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_REGULATIONS_PATH: &str = "data/logistics_data.json";
pub const DEFAULT_INCIDENTS_PATH: &str = "data/incident_counts_by_node.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

pub const DEFAULT_MAX_QUERY_CHARS: usize = 500;

/// How many candidates retrieval keeps, the exclusive score floor, and the
/// longest query that is scored at all
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPolicy {
    pub top_n: usize,
    pub min_score: f64,
    pub max_query_chars: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_n: 10,
            min_score: 30.0,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
        }
    }
}

impl RetrievalPolicy {
    pub fn new(top_n: usize, min_score: f64) -> Self {
        Self {
            top_n,
            min_score,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
        }
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }
}

/// Size bounds applied when projecting records into prompt context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLimits {
    /// Maximum characters kept from a record's notes
    pub summary_chars: usize,
    /// Maximum characters of the serialized context block
    pub context_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            summary_chars: 250,
            context_chars: 1500,
        }
    }
}

/// Completion service configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API key for the completion service
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Model name/version to use
    pub model: String,

    /// Endpoint prefix; the model path is appended to it
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Temperature for response generation (0.0 - 1.0)
    pub temperature: Option<f32>,

    /// Maximum tokens in response
    pub max_output_tokens: Option<u32>,

    /// Extra attempts after a transient failure
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            temperature: Some(0.1),
            max_output_tokens: Some(1024),
            max_retries: 1,
        }
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("CompletionConfig")
            .field("api_key", &api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set endpoint prefix
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set retry budget for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Top-level configuration for binaries
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    pub retrieval: RetrievalPolicy,
    pub limits: ContextLimits,
    pub regulations_path: PathBuf,
    pub incidents_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// A missing `GEMINI_API_KEY` is not an error here: the client is built
    /// unauthenticated and every completion call fails with an
    /// authentication error, so lookups that never reach the model keep
    /// working.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CompletionConfig::default();
        let completion = CompletionConfig {
            api_key: lookup("GEMINI_API_KEY").unwrap_or_default(),
            model: lookup("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout_seconds: parse_var(&lookup, "COMPLETION_TIMEOUT_SECS", defaults.timeout_seconds)?,
            temperature: defaults.temperature,
            max_output_tokens: defaults.max_output_tokens,
            max_retries: parse_var(&lookup, "COMPLETION_MAX_RETRIES", defaults.max_retries)?,
        };

        let policy = RetrievalPolicy::default();
        let retrieval = RetrievalPolicy {
            top_n: parse_var(&lookup, "RETRIEVAL_TOP_N", policy.top_n)?,
            min_score: parse_var(&lookup, "RETRIEVAL_MIN_SCORE", policy.min_score)?,
            max_query_chars: parse_var(
                &lookup,
                "RETRIEVAL_MAX_QUERY_CHARS",
                policy.max_query_chars,
            )?,
        };
        if retrieval.max_query_chars == 0 {
            return Err(ConfigError::Invalid {
                var: "RETRIEVAL_MAX_QUERY_CHARS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&retrieval.min_score) {
            return Err(ConfigError::Invalid {
                var: "RETRIEVAL_MIN_SCORE",
                value: retrieval.min_score.to_string(),
                reason: "must be between 0 and 100".to_string(),
            });
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "BIND_ADDR",
                value: bind_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            completion,
            retrieval,
            limits: ContextLimits::default(),
            regulations_path: lookup("REGULATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGULATIONS_PATH)),
            incidents_path: lookup("INCIDENTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INCIDENTS_PATH)),
            bind_addr,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
