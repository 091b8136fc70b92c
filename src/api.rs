//! HTTP API over the planner
//!
//! An external orchestrator opens a session, asks for a decision each turn,
//! runs the specialist itself and then commits the returned turn.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::delegation::{Decision, DelegationRequest, SessionState, Specialist, Turn};
use crate::error::{AppError, Result};
use crate::AppState;

/// Request to open a session
#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Request for a delegation decision
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub capability: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstructionResponse {
    pub instruction: String,
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/specialists", get(list_specialists))
        .route("/sessions", post(open_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/decide", post(decide))
        .route("/sessions/:id/commit", post(commit))
        .route("/sessions/:id/instruction", get(instruction))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_specialists(State(state): State<Arc<AppState>>) -> Json<Vec<Specialist>> {
    Json(state.planner.policy().registry().specialists().to_vec())
}

async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionState>)> {
    let session = state.planner.open_session(req.session_id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionState>> {
    Ok(Json(state.planner.session(id).await?))
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<Decision>> {
    let request = DelegationRequest::parse(&req.capability)?;
    Ok(Json(state.planner.decide(id, &request).await?))
}

async fn commit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(turn): Json<Turn>,
) -> Result<Json<SessionState>> {
    if turn.session_id != id {
        return Err(AppError::BadRequest(format!(
            "Turn belongs to session {}, not {}",
            turn.session_id, id
        )));
    }
    Ok(Json(state.planner.commit_turn(&turn).await?))
}

async fn instruction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstructionResponse>> {
    let instruction = state.planner.instruction(id).await?;
    Ok(Json(InstructionResponse { instruction }))
}
