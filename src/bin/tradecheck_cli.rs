//! Tradecheck Command Line Interface
//!
//! Runs the regulation pipeline from a terminal, or any of its offline stages
//! on their own.
//!
//! # Usage
//!
//! ```bash
//! # Full pipeline (needs GEMINI_API_KEY)
//! tradecheck_cli ask "lithium batteries"
//!
//! # Ranked dataset matches, no network
//! tradecheck_cli candidates "lithium batery"
//!
//! # Prompt context that would be sent to the model
//! tradecheck_cli context "perfume" --regulations data/logistics_data.json
//!
//! # Incident counts for route nodes
//! tradecheck_cli incidents Delhi Mumbai --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tradecheck::{
    AppConfig, ContextProjector, FuzzyRetriever, GeminiClient, IncidentIndex, QueryOutcome,
    RegulationAdvisor, RegulatoryStore, NO_RELEVANT_REGULATIONS,
};

#[derive(Parser)]
#[command(name = "tradecheck_cli")]
#[command(version)]
#[command(about = "Shipping regulation lookups from the command line")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Regulatory dataset file
    #[arg(long, global = true, env = "REGULATIONS_PATH")]
    regulations: Option<PathBuf>,

    /// Incident counts file
    #[arg(long, global = true, env = "INCIDENTS_PATH")]
    incidents: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask which countries prohibit or restrict an item
    Ask {
        /// Item description, e.g. "lithium batteries"
        query: String,
    },

    /// Show ranked dataset matches with scores (no model call)
    Candidates {
        query: String,
    },

    /// Show the capped prompt context for a query (no model call)
    Context {
        query: String,
    },

    /// Look up incident counts for places
    Incidents {
        #[arg(required = true)]
        places: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tradecheck=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => match &cli.command {
            Commands::Ask { query } => cmd_ask(config, query, cli.json).await,
            Commands::Candidates { query } => cmd_candidates(&config, query, cli.json),
            Commands::Context { query } => cmd_context(&config, query, cli.json),
            Commands::Incidents { places } => cmd_incidents(&config, places),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                println!("{}", json!({"error": format!("{:#}", e)}));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(path) = &cli.regulations {
        config.regulations_path = path.clone();
    }
    if let Some(path) = &cli.incidents {
        config.incidents_path = path.clone();
    }
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_ask(config: AppConfig, query: &str, as_json: bool) -> anyhow::Result<()> {
    let store = Arc::new(RegulatoryStore::load_or_empty(&config.regulations_path));
    let max_retries = config.completion.max_retries;
    let client = Arc::new(GeminiClient::new(config.completion)?);
    let advisor = RegulationAdvisor::new(store, client)
        .with_retrieval_policy(config.retrieval)
        .with_limits(config.limits)
        .with_max_retries(max_retries);

    match advisor.answer(query).await? {
        QueryOutcome::Answered(answer) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{} {}", "Prohibited in:".red().bold(), list(&answer.prohibited_in));
                println!("{} {}", "Restricted in:".yellow().bold(), list(&answer.restricted_in));
                let matched: Vec<&str> = answer.candidates.iter().map(|c| c.key.as_str()).collect();
                println!("{} {}", "Matched:".dimmed(), matched.join(", "));
                println!("{} {} ms", "Elapsed:".dimmed(), answer.elapsed_ms);
            }
            Ok(())
        }
        QueryOutcome::NoRelevantItems => {
            if as_json {
                println!("{}", json!({"error": NO_RELEVANT_REGULATIONS}));
            } else {
                println!("{}", NO_RELEVANT_REGULATIONS);
            }
            Ok(())
        }
        QueryOutcome::QueryTooLong { length, limit } => {
            anyhow::bail!("query is {} characters long; the limit is {}", length, limit)
        }
        QueryOutcome::DatasetUnavailable { reason } => {
            anyhow::bail!("regulatory dataset unavailable: {}", reason)
        }
    }
}

fn cmd_candidates(config: &AppConfig, query: &str, as_json: bool) -> anyhow::Result<()> {
    let store = RegulatoryStore::load_or_empty(&config.regulations_path);
    let candidates = FuzzyRetriever::new(config.retrieval).rank(query, store.keys());

    if as_json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("{}", NO_RELEVANT_REGULATIONS);
    }
    for (i, candidate) in candidates.iter().enumerate() {
        println!("  [{}] {:>5.1}  {}", i + 1, candidate.score, candidate.key.cyan());
    }
    Ok(())
}

fn cmd_context(config: &AppConfig, query: &str, as_json: bool) -> anyhow::Result<()> {
    let store = RegulatoryStore::load_or_empty(&config.regulations_path);
    let keys = FuzzyRetriever::new(config.retrieval).retrieve(query, store.keys());
    let context = ContextProjector::new(config.limits).project(&keys, &store)?;

    if as_json {
        let dropped = context.dropped();
        println!(
            "{}",
            json!({
                "context": context.as_str(),
                "chars": context.as_str().chars().count(),
                "dropped": dropped,
            })
        );
        return Ok(());
    }

    if context.is_empty() {
        println!("{}", NO_RELEVANT_REGULATIONS);
        return Ok(());
    }
    println!("{}", context.as_str());
    println!(
        "{} {} chars, {} item(s), {} dropped",
        "OK".green(),
        context.as_str().chars().count(),
        context.items().len(),
        context.dropped().len()
    );
    Ok(())
}

fn cmd_incidents(config: &AppConfig, places: &[String]) -> anyhow::Result<()> {
    let index = IncidentIndex::load_or_empty(&config.incidents_path);
    let reports = index.lookup(places);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn list(codes: &[String]) -> String {
    if codes.is_empty() {
        "none".to_string()
    } else {
        codes.join(", ")
    }
}
