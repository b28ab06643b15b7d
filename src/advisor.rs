//! Query orchestration
//!
//! ```text
//! query → FuzzyRetriever → ContextProjector → prompt::build → CompletionClient → ShippingVerdict
//! ```
//!
//! Each call is independent; the advisor only holds read-only shared state,
//! so one instance serves concurrent requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::completion::CompletionClient;
use crate::config::{ContextLimits, RetrievalPolicy};
use crate::dataset::{DatasetStatus, RegulatoryStore};
use crate::error::{AdvisorError, CompletionError, ConsistencyError};
use crate::projection::{ContextProjector, ProjectedContext};
use crate::prompt;
use crate::retrieval::{FuzzyRetriever, RetrievalCandidate};
use crate::verdict::ShippingVerdict;

/// Message returned when no dataset item matches the query
pub const NO_RELEVANT_REGULATIONS: &str = "No relevant regulations found for this item.";

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// A successful model-backed answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationAnswer {
    pub query: String,
    pub candidates: Vec<RetrievalCandidate>,
    pub prohibited_in: Vec<String>,
    pub restricted_in: Vec<String>,
    pub raw_response: String,
    pub elapsed_ms: u64,
}

impl RegulationAnswer {
    pub fn verdict(&self) -> ShippingVerdict {
        ShippingVerdict {
            prohibited_in: self.prohibited_in.clone(),
            restricted_in: self.restricted_in.clone(),
        }
    }
}

/// Non-error outcomes of [`RegulationAdvisor::answer`]
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Answered(RegulationAnswer),
    /// Nothing cleared the retrieval threshold; the model was not called
    NoRelevantItems,
    /// The query exceeds the retrieval length limit and was not scored
    QueryTooLong { length: usize, limit: usize },
    /// The dataset failed to load at startup; the model was not called
    DatasetUnavailable { reason: String },
}

/// Answers free-text trade questions from the regulatory dataset
pub struct RegulationAdvisor {
    store: Arc<RegulatoryStore>,
    client: Arc<dyn CompletionClient>,
    retriever: FuzzyRetriever,
    projector: ContextProjector,
    max_retries: u32,
}

impl RegulationAdvisor {
    /// Create with default retrieval policy, context limits and one retry
    pub fn new(store: Arc<RegulatoryStore>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            store,
            client,
            retriever: FuzzyRetriever::default(),
            projector: ContextProjector::default(),
            max_retries: 1,
        }
    }

    pub fn with_retrieval_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.retriever = FuzzyRetriever::new(policy);
        self
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.projector = ContextProjector::new(limits);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &RegulatoryStore {
        &self.store
    }

    /// Ranked candidates for a query, without calling the model
    pub fn candidates(&self, query: &str) -> Vec<RetrievalCandidate> {
        self.retriever.rank(query, self.store.keys())
    }

    /// Projected context for a query, or `None` when nothing matches
    pub fn context_for(&self, query: &str) -> Result<Option<ProjectedContext>, ConsistencyError> {
        let keys: Vec<String> = self.candidates(query).into_iter().map(|c| c.key).collect();
        if keys.is_empty() {
            return Ok(None);
        }
        let context = self.projector.project(&keys, &self.store)?;
        Ok((!context.is_empty()).then_some(context))
    }

    /// Run the full pipeline for one query
    pub async fn answer(&self, query: &str) -> Result<QueryOutcome, AdvisorError> {
        let started = Instant::now();
        let result = self.run(query, started).await;

        let outcome = match &result {
            Ok(QueryOutcome::Answered(_)) => "answered",
            Ok(QueryOutcome::NoRelevantItems) => "no relevant items",
            Ok(QueryOutcome::QueryTooLong { .. }) => "query too long",
            Ok(QueryOutcome::DatasetUnavailable { .. }) => "dataset unavailable",
            Err(_) => "failed",
        };
        info!(
            "Execution time: {:.2} seconds ({})",
            started.elapsed().as_secs_f64(),
            outcome
        );

        result
    }

    async fn run(&self, query: &str, started: Instant) -> Result<QueryOutcome, AdvisorError> {
        if let DatasetStatus::Unavailable(reason) = self.store.status() {
            warn!("Query received while regulatory dataset is unavailable");
            return Ok(QueryOutcome::DatasetUnavailable {
                reason: reason.clone(),
            });
        }

        let trimmed = query.trim();
        if !self.retriever.accepts(trimmed) {
            let limit = self.retriever.policy().max_query_chars;
            warn!("Rejected query longer than {} chars", limit);
            return Ok(QueryOutcome::QueryTooLong {
                length: trimmed.chars().count(),
                limit,
            });
        }
        if trimmed.is_empty() {
            return Ok(QueryOutcome::NoRelevantItems);
        }

        let candidates = self.candidates(query);
        if candidates.is_empty() {
            info!("No relevant regulations for {:?}", query);
            return Ok(QueryOutcome::NoRelevantItems);
        }

        let keys: Vec<String> = candidates.iter().map(|c| c.key.clone()).collect();
        let context = self.projector.project(&keys, &self.store)?;
        if context.is_empty() {
            warn!("Every candidate for {:?} exceeded the context cap", query);
            return Ok(QueryOutcome::NoRelevantItems);
        }

        let prompt = prompt::build(query, context.as_str());
        let raw_response = self.complete_with_retry(&prompt).await?;
        let verdict = ShippingVerdict::parse(&raw_response)?;

        info!(
            "Answered from {} candidates via {} ({})",
            candidates.len(),
            self.client.model_name(),
            self.client.provider_name()
        );

        Ok(QueryOutcome::Answered(RegulationAnswer {
            query: query.to_string(),
            candidates,
            prohibited_in: verdict.prohibited_in,
            restricted_in: verdict.restricted_in,
            raw_response,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    async fn complete_with_retry(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        "Completion attempt {} failed ({}), retrying in {} ms",
                        attempt,
                        e,
                        RETRY_BACKOFF.as_millis()
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RegulatoryRecord;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    /// Returns queued results in order and records every prompt
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, CompletionError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn battery_store() -> Arc<RegulatoryStore> {
        let mut records = BTreeMap::new();
        records.insert(
            "lithium battery".to_string(),
            RegulatoryRecord::new(["IN"], ["CN"], Some("Flammable")),
        );
        Arc::new(RegulatoryStore::from_records(records))
    }

    const GOOD_REPLY: &str = r#"{"prohibited_in": ["IN"], "restricted_in": ["CN"]}"#;

    #[tokio::test]
    async fn test_answer_success() {
        let client = ScriptedClient::new(vec![Ok(GOOD_REPLY.to_string())]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        let outcome = advisor.answer("lithium batery").await.unwrap();
        let QueryOutcome::Answered(answer) = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(answer.prohibited_in, vec!["IN"]);
        assert_eq!(answer.restricted_in, vec!["CN"]);
        assert_eq!(answer.candidates[0].key, "lithium battery");
        assert_eq!(answer.raw_response, GOOD_REPLY);
        assert_eq!(client.calls(), 1);

        let prompt = client.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("lithium batery"));
        assert!(prompt.contains(r#""summary":"Flammable""#));
    }

    #[tokio::test]
    async fn test_no_candidates_skips_client() {
        let client = ScriptedClient::new(vec![]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        assert!(matches!(
            advisor.answer("").await.unwrap(),
            QueryOutcome::NoRelevantItems
        ));
        assert!(matches!(
            advisor.answer("zzzz qqqq").await.unwrap(),
            QueryOutcome::NoRelevantItems
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_dataset_skips_client() {
        let client = ScriptedClient::new(vec![]);
        let store = Arc::new(RegulatoryStore::unavailable("file missing"));
        let advisor = RegulationAdvisor::new(store, client.clone());

        match advisor.answer("lithium battery").await.unwrap() {
            QueryOutcome::DatasetUnavailable { reason } => assert_eq!(reason, "file missing"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_retried_once() {
        let client = ScriptedClient::new(vec![
            Err(CompletionError::Transport("connection reset".into())),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        assert!(matches!(
            advisor.answer("lithium battery").await.unwrap(),
            QueryOutcome::Answered(_)
        ));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_after_retry_budget() {
        let client = ScriptedClient::new(vec![
            Err(CompletionError::Transport("down".into())),
            Err(CompletionError::Transport("still down".into())),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        let err = advisor.answer("lithium battery").await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::Completion(CompletionError::Transport(_))
        ));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_authentication_error_not_retried() {
        let client = ScriptedClient::new(vec![
            Err(CompletionError::Authentication("bad key".into())),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        let err = advisor.answer("lithium battery").await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::Completion(CompletionError::Authentication(_))
        ));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_not_retried() {
        let client = ScriptedClient::new(vec![
            Ok("Sorry, I can't answer that.".to_string()),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone());

        let err = advisor.answer("lithium battery").await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::Completion(CompletionError::MalformedOutput { .. })
        ));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_disabled() {
        let client = ScriptedClient::new(vec![
            Err(CompletionError::Timeout(30)),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone()).with_max_retries(0);

        assert!(advisor.answer("lithium battery").await.is_err());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_query_skips_client() {
        let client = ScriptedClient::new(vec![Ok(GOOD_REPLY.to_string())]);
        let mut records = BTreeMap::new();
        records.insert(
            "dry ice".to_string(),
            RegulatoryRecord::new(["US"], ["JP"], None),
        );
        let store = Arc::new(RegulatoryStore::from_records(records));
        let advisor = RegulationAdvisor::new(store, client.clone());

        assert!(matches!(
            advisor.answer("   ").await.unwrap(),
            QueryOutcome::NoRelevantItems
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_query_rejected_before_retrieval() {
        let client = ScriptedClient::new(vec![Ok(GOOD_REPLY.to_string())]);
        let advisor = RegulationAdvisor::new(battery_store(), client.clone())
            .with_retrieval_policy(RetrievalPolicy::default().with_max_query_chars(32));

        let query = "lithium battery".repeat(10);
        match advisor.answer(&query).await.unwrap() {
            QueryOutcome::QueryTooLong { length, limit } => {
                assert_eq!(length, 150);
                assert_eq!(limit, 32);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(client.calls(), 0);

        assert!(matches!(
            advisor.answer("lithium battery").await.unwrap(),
            QueryOutcome::Answered(_)
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_elapsed_time_logged_on_every_exit() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let client = ScriptedClient::new(vec![Err(CompletionError::Authentication(
            "bad key".into(),
        ))]);
        let advisor = RegulationAdvisor::new(battery_store(), client);

        tracing::subscriber::with_default(subscriber, || {
            runtime.block_on(async {
                advisor.answer("zzzz qqqq").await.unwrap();
                advisor.answer("lithium battery").await.unwrap_err();
            })
        });

        let text = logs.text();
        assert!(text.contains("Execution time:"), "logs were: {text}");
        assert!(text.contains("(no relevant items)"), "logs were: {text}");
        assert!(text.contains("(failed)"), "logs were: {text}");
    }

    #[test]
    fn test_context_for() {
        let client = ScriptedClient::new(vec![]);
        let advisor = RegulationAdvisor::new(battery_store(), client)
            .with_retrieval_policy(RetrievalPolicy::new(3, 30.0));
        let context = advisor.context_for("battery").unwrap().unwrap();
        assert_eq!(context.keys().collect::<Vec<_>>(), vec!["lithium battery"]);
        assert!(advisor.context_for("").unwrap().is_none());
    }
}
