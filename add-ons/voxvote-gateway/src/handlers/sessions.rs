//! Session lifecycle: start, poll, cancel.

use super::{blocking, ApiError};
use crate::app::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use voxvote_core::{SessionId, StatusEvent, VoteError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: SessionId,
}

/// Ids that could never have been issued are simply unknown.
fn session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).ok_or_else(|| VoteError::NotFound(raw.to_string()).into())
}

/// `POST /sessions`
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let coordinator = state.coordinator.clone();
    let session_id = blocking(move || coordinator.start()).await?;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

/// `GET /sessions/:id`
pub async fn poll_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<StatusEvent>, ApiError> {
    let id = session_id(&raw)?;
    let coordinator = state.coordinator.clone();
    let event = blocking(move || coordinator.poll(&id)).await?;
    Ok(Json(event))
}

/// `DELETE /sessions/:id`
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = session_id(&raw)?;
    let coordinator = state.coordinator.clone();
    blocking(move || coordinator.cancel(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
