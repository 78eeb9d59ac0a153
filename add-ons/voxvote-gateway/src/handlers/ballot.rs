//! Read-only ballot views.

use super::{blocking, ApiError};
use crate::app::AppState;
use axum::extract::State;
use axum::Json;
use voxvote_core::{tally_all, Candidate, TallyEntry};

/// `GET /candidates`, in presentation order.
pub async fn list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(blocking(move || store.list_candidates()).await?))
}

/// `GET /results`: every candidate, zero counts included, by candidate id.
pub async fn results(State(state): State<AppState>) -> Result<Json<Vec<TallyEntry>>, ApiError> {
    let store = state.store.clone();
    Ok(Json(blocking(move || tally_all(store.as_ref())).await?))
}
