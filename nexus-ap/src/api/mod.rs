//! HTTP/SSE presentation adapter
//!
//! Panels talk to the player through this API: they send commands and
//! listen to the event stream.

pub mod handlers;
pub mod sse;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::playback::SupervisorHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    /// Server port (reported by /health)
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(handlers::health))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                .route("/sources", get(handlers::get_sources))
                .route("/status", get(handlers::get_status))
                // Playback control
                .route("/playback/play", post(handlers::play))
                .route("/playback/toggle", post(handlers::toggle))
                .route("/playback/stop", post(handlers::stop))
                .route("/audio/volume", post(handlers::set_volume))
                // Settings
                .route("/settings", get(handlers::get_settings))
                .route("/settings/fade", post(handlers::set_fade))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local panels
        .layer(CorsLayer::permissive())
}
