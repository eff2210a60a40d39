//! HTTP request handlers
//!
//! Thin adapters from HTTP to [`SupervisorHandle`]. Commands are accepted
//! and acknowledged immediately; the resulting state changes arrive over
//! the event stream.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nexus_common::{PlayerStatus, SourceDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AppState;
use crate::error::Error;
use crate::playback::SupervisorState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_profile: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    source_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayResponse {
    pub status: String,
    pub source_id: String,
    pub source_name: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: f64, // 0-100 user-facing scale
}

#[derive(Debug, Deserialize)]
pub struct FadeRequest {
    seconds: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub crossfade_seconds: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayerStatusResponse {
    pub status: PlayerStatus,
    pub supervisor_state: SupervisorState,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub now_playing: Option<String>,
    pub theme_gradient: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::UnknownSource(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Common(nexus_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Error::SpawnFailed { .. } | Error::EngineUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Error::SupervisorGone => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn accepted() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "nexus-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: state.port,
    })
}

// ============================================================================
// Catalog and Status
// ============================================================================

/// GET /api/v1/sources - Ordered source catalog
pub async fn get_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.supervisor.catalog().sources().to_vec(),
    })
}

/// GET /api/v1/status - Current status snapshot
pub async fn get_status(State(state): State<AppState>) -> Json<PlayerStatusResponse> {
    let status = state.supervisor.status();
    Json(PlayerStatusResponse {
        status: status.status,
        supervisor_state: state.supervisor.state(),
        source_id: status.source_id,
        source_name: status.source_name,
        now_playing: status.now_playing,
        theme_gradient: status.theme_gradient,
    })
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /api/v1/playback/play - Select a source
pub async fn play(
    State(state): State<AppState>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, Error> {
    let source = state.supervisor.play(&req.source_id).map_err(|e| {
        warn!("Play request for '{}' rejected: {}", req.source_id, e);
        e
    })?;
    info!("Play requested: {}", source.id);
    Ok(Json(PlayResponse {
        status: "ok".to_string(),
        source_id: source.id,
        source_name: source.display_name,
    }))
}

/// POST /api/v1/playback/toggle - Toggle pause on the current session
pub async fn toggle(State(state): State<AppState>) -> Result<Json<StatusResponse>, Error> {
    state.supervisor.toggle()?;
    Ok(accepted())
}

/// POST /api/v1/playback/stop - Stop playback
pub async fn stop(State(state): State<AppState>) -> Result<Json<StatusResponse>, Error> {
    info!("Stop requested");
    state.supervisor.stop()?;
    Ok(accepted())
}

/// POST /api/v1/audio/volume - Set current session volume (0-100)
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<StatusResponse>, Error> {
    state.supervisor.set_volume(req.volume)?;
    Ok(accepted())
}

// ============================================================================
// Settings
// ============================================================================

/// GET /api/v1/settings - Persisted user settings
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        crossfade_seconds: state.supervisor.fade_seconds(),
    })
}

/// POST /api/v1/settings/fade - Persist crossfade duration (0.5-5 s)
pub async fn set_fade(
    State(state): State<AppState>,
    Json(req): Json<FadeRequest>,
) -> Result<Json<SettingsResponse>, Error> {
    let crossfade_seconds = state.supervisor.set_fade(req.seconds)?;
    Ok(Json(SettingsResponse { crossfade_seconds }))
}
