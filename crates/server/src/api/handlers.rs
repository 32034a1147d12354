use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vidgrab_core::{estimate_size_mb, CompressionQuality, SanitizedConfig};

use super::error::ApiError;
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Query parameters for the compression size estimate
#[derive(Debug, Deserialize)]
pub struct EstimateParams {
    /// Input size in megabytes
    pub size_mb: f64,
    /// high, medium or low (default: medium)
    pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub input_size_mb: f64,
    pub quality: CompressionQuality,
    /// Estimated output size, two decimals
    pub estimated_size_mb: String,
}

/// Estimate the output size of a compression job
pub async fn compression_estimate(
    Query(params): Query<EstimateParams>,
) -> Result<Json<EstimateResponse>, ApiError> {
    if !params.size_mb.is_finite() || params.size_mb < 0.0 {
        return Err(ApiError::bad_request("size_mb must be a non-negative number"));
    }

    let quality = match params.quality.as_deref() {
        Some(q) => q.parse::<CompressionQuality>().map_err(ApiError::bad_request)?,
        None => CompressionQuality::default(),
    };

    Ok(Json(EstimateResponse {
        input_size_mb: params.size_mb,
        quality,
        estimated_size_mb: format!("{:.2}", estimate_size_mb(params.size_mb, quality)),
    }))
}

/// Prometheus text exposition
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    metrics::collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
