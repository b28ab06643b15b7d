//! Tradecheck REST API Server
//!
//! ## Usage
//!
//! ```bash
//! GEMINI_API_KEY=... cargo run --bin tradecheck_server
//!
//! curl http://localhost:8000/health
//! curl -X POST http://localhost:8000/prohibited_items \
//!   -H "Content-Type: application/json" \
//!   -d '{"query": "lithium batteries"}'
//! curl -X POST http://localhost:8000/incidents \
//!   -H "Content-Type: application/json" \
//!   -d '{"places": ["Delhi", "Mumbai"]}'
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tradecheck::api::{create_router, AppState};
use tradecheck::{AppConfig, GeminiClient, IncidentIndex, RegulationAdvisor, RegulatoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tradecheck=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store = Arc::new(RegulatoryStore::load_or_empty(&config.regulations_path));
    let incidents = Arc::new(IncidentIndex::load_or_empty(&config.incidents_path));

    if config.completion.api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; regulation queries will fail to authenticate");
    }

    let max_retries = config.completion.max_retries;
    let client = Arc::new(
        GeminiClient::new(config.completion).context("failed to build Gemini client")?,
    );
    let advisor = RegulationAdvisor::new(store, client)
        .with_retrieval_policy(config.retrieval)
        .with_limits(config.limits)
        .with_max_retries(max_retries);

    let app = create_router(AppState {
        advisor: Arc::new(advisor),
        incidents,
    });

    info!("Starting server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
