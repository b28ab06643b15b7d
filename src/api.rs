//! HTTP API
//!
//! ```text
//! GET  /health             dataset status
//! GET  /test-cors          CORS check used by the web frontend
//! POST /prohibited_items   {"query": "..."}      → regulation answer
//! POST /incidents          {"places": ["..."]}   → [{place: value}, ...]
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::advisor::{QueryOutcome, RegulationAdvisor, NO_RELEVANT_REGULATIONS};
use crate::error::AdvisorError;
use crate::incidents::{IncidentIndex, IncidentReport};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<RegulationAdvisor>,
    pub incidents: Arc<IncidentIndex>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemQuery {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlacesQuery {
    pub places: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub regulations: usize,
    pub dataset: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/test-cors", get(test_cors))
        .route("/prohibited_items", post(prohibited_items))
        .route("/incidents", post(incidents))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.advisor.store();
    Json(HealthResponse {
        status: "ok".to_string(),
        regulations: store.len(),
        dataset: if store.is_available() {
            "loaded".to_string()
        } else {
            "unavailable".to_string()
        },
    })
}

async fn test_cors() -> Json<serde_json::Value> {
    Json(json!({"message": "CORS is working"}))
}

async fn prohibited_items(
    State(state): State<AppState>,
    Json(request): Json<ItemQuery>,
) -> Response {
    match state.advisor.answer(&request.query).await {
        Ok(QueryOutcome::Answered(answer)) => (StatusCode::OK, Json(answer)).into_response(),
        Ok(QueryOutcome::NoRelevantItems) => (
            StatusCode::OK,
            Json(json!({"error": NO_RELEVANT_REGULATIONS})),
        )
            .into_response(),
        Ok(QueryOutcome::QueryTooLong { length, limit }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": format!("Query is {} characters long; the limit is {}.", length, limit),
                "max_query_chars": limit,
            })),
        )
            .into_response(),
        Ok(QueryOutcome::DatasetUnavailable { reason }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Regulatory dataset unavailable", "detail": reason})),
        )
            .into_response(),
        Err(AdvisorError::Completion(e)) => {
            warn!("Completion failed for {:?}: {}", request.query, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string(), "kind": e.kind()})),
            )
                .into_response()
        }
        Err(AdvisorError::Consistency(e)) => {
            error!("Internal consistency failure: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn incidents(
    State(state): State<AppState>,
    Json(request): Json<PlacesQuery>,
) -> Json<Vec<IncidentReport>> {
    Json(state.incidents.lookup(&request.places))
}
