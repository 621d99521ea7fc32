//! # HTTP Surface
//!
//! Read-only axum routes over the pipeline:
//!
//! | Route | Pipeline call |
//! |---|---|
//! | `POST /query` | `process_query` |
//! | `POST /citations` | `validate_citations` |
//! | `GET /reasoning/{id}` | `explain_reasoning` |
//! | `GET /health` | snapshot and trace-cache counters |
//!
//! The pipeline is synchronous, so every call runs on the blocking pool.
//! Query text is never rejected here: blank or unparseable text gets the
//! pipeline's degraded answer.
//! No explanation provider is wired in: a caller that already has
//! explainer output passes it in the request body and gets it validated;
//! otherwise the answer is the citation-only fallback.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use nyaya_core::{
    Audience, CitationCheck, Explanation, GraphStore, OfflineExplainer, Pipeline, QueryId,
    QueryResponse, ReasoningTrace, SessionContext, StaticExplainer,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Upper bound on citations per bulk request.
pub const MAX_CITATIONS_PER_REQUEST: usize = 500;

// =============================================================================
// STATE AND ERRORS
// =============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Run a pipeline call on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!(error = %e, "pipeline task failed");
        ApiError::Internal("pipeline task failed".to_string())
    })
}

// =============================================================================
// REQUEST / RESPONSE BODIES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Defaults to `citizen`.
    #[serde(default)]
    pub audience: Option<Audience>,
    /// Previous turn, for follow-up questions.
    #[serde(default)]
    pub prior_query: Option<String>,
    /// Explainer output to validate instead of the fallback.
    #[serde(default)]
    pub explanation: Option<Explanation>,
}

#[derive(Debug, Deserialize)]
pub struct CitationsRequest {
    pub citations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReasoningResponse {
    pub trace: ReasoningTrace,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub snapshot_version: String,
    pub nodes: usize,
    pub edges: usize,
    pub trace_cache: TraceCacheHealth,
}

#[derive(Debug, Serialize)]
pub struct TraceCacheHealth {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the router for `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/citations", post(citations))
        .route("/reasoning/{id}", get(reasoning))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /query
async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let audience = request.audience.unwrap_or(Audience::Citizen);
    debug!(audience = audience.as_str(), "query received");

    let pipeline = Arc::clone(&state.pipeline);
    let response = blocking(move || {
        let session = request.prior_query.map(SessionContext::with_prior_query);
        match request.explanation {
            Some(explanation) => pipeline.process_query(
                &request.query,
                audience,
                session.as_ref(),
                &StaticExplainer::new(explanation),
            ),
            None => pipeline.process_query(
                &request.query,
                audience,
                session.as_ref(),
                &OfflineExplainer,
            ),
        }
    })
    .await?;

    Ok(Json(response))
}

/// POST /citations
async fn citations(
    State(state): State<AppState>,
    Json(request): Json<CitationsRequest>,
) -> Result<Json<Vec<CitationCheck>>, ApiError> {
    if request.citations.len() > MAX_CITATIONS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "at most {} citations per request (got {})",
            MAX_CITATIONS_PER_REQUEST,
            request.citations.len()
        )));
    }

    let pipeline = Arc::clone(&state.pipeline);
    let checks = blocking(move || pipeline.validate_citations(&request.citations)).await?;
    Ok(Json(checks))
}

/// GET /reasoning/{id}
async fn reasoning(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ReasoningResponse>, ApiError> {
    let query_id = QueryId(id);
    let trace = state
        .pipeline
        .explain_reasoning(query_id)
        .ok_or_else(|| ApiError::NotFound(format!("no reasoning trace for {query_id}")))?;

    let text = trace.to_text();
    Ok(Json(ReasoningResponse { trace, text }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.pipeline.store().current();
    let stats = state.pipeline.trace_cache_stats();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        snapshot_version: snapshot.version().to_string(),
        nodes: snapshot.graph().node_count(),
        edges: snapshot.graph().edge_count(),
        trace_cache: TraceCacheHealth {
            size: stats.size,
            capacity: stats.capacity,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        },
    })
}
