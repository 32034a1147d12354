//! One-shot queries: livestream status, Instagram extraction and history.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use vidgrab_core::{HistorySnapshot, InstagramMedia, LivestreamStatus, MediaFormat};

use super::error::ApiError;
use super::playlist::UrlBody;
use crate::state::AppState;

/// Whether a stream is live, upcoming or archived
pub async fn livestream_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlBody>,
) -> Result<Json<LivestreamStatus>, ApiError> {
    Ok(Json(state.orchestrator().check_livestream(&body.url).await?))
}

#[derive(Debug, Deserialize)]
pub struct InstagramBody {
    pub url: String,
    #[serde(default)]
    pub format: MediaFormat,
}

/// Direct media link of an Instagram reel or post
pub async fn instagram(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InstagramBody>,
) -> Result<Json<InstagramMedia>, ApiError> {
    Ok(Json(
        state
            .orchestrator()
            .extract_instagram(&body.url, body.format)
            .await?,
    ))
}

/// Cached history, as of the last refresh
pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<HistorySnapshot> {
    Json(state.orchestrator().history().await)
}

pub async fn refresh_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistorySnapshot>, ApiError> {
    Ok(Json(state.orchestrator().refresh_history().await?))
}
