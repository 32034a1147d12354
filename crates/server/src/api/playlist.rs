//! Playlist selection handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use vidgrab_core::SelectionSnapshot;

use super::error::ApiError;
use crate::state::AppState;

/// Request body carrying a single URL
#[derive(Debug, Deserialize)]
pub struct UrlBody {
    pub url: String,
}

/// Load a playlist manifest; every item starts selected
pub async fn fetch_playlist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlBody>,
) -> Result<Json<SelectionSnapshot>, ApiError> {
    Ok(Json(state.orchestrator().fetch_playlist(&body.url).await?))
}

pub async fn get_selection(State(state): State<Arc<AppState>>) -> Json<SelectionSnapshot> {
    Json(state.orchestrator().selection().await)
}

pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<SelectionSnapshot> {
    Json(state.orchestrator().toggle(&id).await)
}

pub async fn select_all(State(state): State<Arc<AppState>>) -> Json<SelectionSnapshot> {
    Json(state.orchestrator().select_all().await)
}

pub async fn deselect_all(State(state): State<Arc<AppState>>) -> Json<SelectionSnapshot> {
    Json(state.orchestrator().deselect_all().await)
}
