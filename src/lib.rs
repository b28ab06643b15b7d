//! Tradecheck - shipping regulation lookups backed by a generative model
//!
//! Answers questions like "can I ship lithium batteries to India?" by
//! fuzzy-matching the item against a static regulatory dataset, projecting
//! the matching records into a bounded prompt context, and asking Gemini for
//! the prohibited and restricted country lists.
//!
//! ## Pipeline
//!
//! ```text
//! query → retrieval → projection → prompt → completion → verdict
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tradecheck::{CompletionConfig, GeminiClient, QueryOutcome, RegulationAdvisor, RegulatoryStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(RegulatoryStore::load_or_empty("data/logistics_data.json"));
//! let client = Arc::new(GeminiClient::new(CompletionConfig::new("api-key", "gemini-1.5-flash"))?);
//! let advisor = RegulationAdvisor::new(store, client);
//!
//! if let QueryOutcome::Answered(answer) = advisor.answer("lithium batteries").await? {
//!     println!("prohibited: {:?}", answer.prohibited_in);
//! }
//! # Ok(())
//! # }
//! ```

pub mod advisor;
pub mod completion;
pub mod config;
pub mod dataset;
pub mod error;
pub mod incidents;
pub mod projection;
pub mod prompt;
pub mod retrieval;
pub mod verdict;

// HTTP surface (when enabled)
#[cfg(feature = "server")]
pub mod api;

// Re-exports for convenience
pub use advisor::{QueryOutcome, RegulationAdvisor, RegulationAnswer, NO_RELEVANT_REGULATIONS};
pub use completion::{CompletionClient, GeminiClient};
pub use config::{AppConfig, CompletionConfig, ContextLimits, RetrievalPolicy};
pub use dataset::{DatasetStatus, RegulatoryRecord, RegulatoryStore};
pub use error::{AdvisorError, CompletionError, ConfigError, ConsistencyError, DatasetLoadError};
pub use incidents::{IncidentIndex, IncidentReport, NO_INCIDENT_SENTINEL};
pub use projection::{ContextProjector, ProjectedContext, ProjectedItem};
pub use retrieval::{FuzzyRetriever, RetrievalCandidate};
pub use verdict::ShippingVerdict;
