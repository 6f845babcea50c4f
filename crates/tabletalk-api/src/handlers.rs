//! Route handlers for all API endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabletalk_chat::{GenerationErrorKind, SessionSummary};
use tabletalk_core::ConversationTurn;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub dataset_loaded: bool,
    pub sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub source: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct TurnsResponse {
    pub session_id: Uuid,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// The two turns appended by one query.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: Uuid,
    pub match_count: usize,
    pub turns: Vec<ConversationTurn>,
    /// Present when the assistant turn reports a generation failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationErrorKind>,
}

// =============================================================================
// Public
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        dataset_loaded: state.registry.dataset().cached().is_some(),
        sessions: state.registry.len(),
    })
}

// =============================================================================
// Dataset
// =============================================================================

/// GET /dataset - shape of the loaded table. 503 until a session has loaded it.
pub async fn dataset(State(state): State<AppState>) -> Result<Json<DatasetResponse>, ApiError> {
    let dataset = state.registry.dataset();
    let table = dataset.cached().ok_or_else(|| {
        ApiError::ServiceUnavailable("dataset has not been loaded yet".to_string())
    })?;
    Ok(Json(DatasetResponse {
        source: dataset.source(),
        columns: table.column_names().map(str::to_string).collect(),
        row_count: table.row_count(),
    }))
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    state.registry.prune_expired();
    let summary = state.registry.create_session().await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.registry.list(),
    })
}

/// GET /sessions/{id}/turns
pub async fn session_turns(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnsResponse>, ApiError> {
    let turns = state.registry.history(id).await?;
    Ok(Json(TurnsResponse {
        session_id: id,
        turns,
    }))
}

/// POST /sessions/{id}/query
pub async fn submit_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let outcome = state.registry.submit_query(id, &body.query).await?;
    Ok(Json(QueryResponse {
        session_id: id,
        match_count: outcome.match_count,
        turns: vec![outcome.user_turn, outcome.assistant_turn],
        error: outcome.error,
    }))
}

/// POST /sessions/{id}/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.reset(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.teardown(id)?;
    Ok(StatusCode::NO_CONTENT)
}
