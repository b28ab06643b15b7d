//! Error types for the trade regulation pipeline
//!
//! One `thiserror` enum per stage. Advisor failures wrap completion and
//! consistency errors; dataset and config errors only occur at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or validate a JSON dataset at startup
#[derive(Error, Debug)]
pub enum DatasetLoadError {
    #[error("dataset file not found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a [`crate::completion::CompletionClient`]
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion transport failed: {0}")]
    Transport(String),

    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("completion authentication failed: {0}")]
    Authentication(String),

    #[error("completion service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("completion service returned no text")]
    EmptyResponse,

    #[error("malformed completion output: {reason}")]
    MalformedOutput { reason: String, raw: String },
}

impl CompletionError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Authentication failures and malformed output are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            Self::Authentication(_) | Self::EmptyResponse | Self::MalformedOutput { .. } => false,
        }
    }

    /// Short machine-readable tag, used in API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Authentication(_) => "authentication",
            Self::Service { .. } => "service",
            Self::EmptyResponse => "empty_response",
            Self::MalformedOutput { .. } => "malformed_output",
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// A retrieved key has no record in the store. Indicates a bug, not bad input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("candidate '{key}' is missing from the regulatory dataset")]
    MissingRecord { key: String },
}

/// Failure outcomes of [`crate::advisor::RegulationAdvisor::answer`]
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("internal consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

/// Invalid or missing environment configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
