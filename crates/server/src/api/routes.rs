use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, jobs, middleware::metrics_middleware, playlist, queries, ws};
use crate::state::AppState;

/// Largest accepted upload for conversion and compression.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{kind}", get(jobs::get_job).post(jobs::submit_job))
        .route(
            "/jobs/{kind}/upload",
            post(jobs::upload_job).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/jobs/{kind}/reset", post(jobs::reset_job))
        .route("/jobs/{kind}/resource", get(jobs::get_resource))
        .route("/recording/stop", post(jobs::stop_recording))
        // Playlist selection
        .route(
            "/playlist",
            get(playlist::get_selection).post(playlist::fetch_playlist),
        )
        .route("/playlist/toggle/{id}", post(playlist::toggle))
        .route("/playlist/select-all", post(playlist::select_all))
        .route("/playlist/deselect-all", post(playlist::deselect_all))
        // One-shot queries
        .route("/livestream/status", post(queries::livestream_status))
        .route("/instagram", post(queries::instagram))
        .route("/history", get(queries::get_history))
        .route("/history/refresh", post(queries::refresh_history))
        .route("/compression/estimate", get(handlers::compression_estimate))
        // Real-time updates
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
