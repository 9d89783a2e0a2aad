//! HTTP endpoint handlers
//!
//! - POST /api/v1/auth/login - Create a pending player session
//! - GET /api/v1/health - Liveness and occupancy

use std::sync::Arc;

use axum::{extract::State, Json};
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use crate::api::error::ApiError;
use crate::api::response::{ApiResponse, HealthData, LoginData};
use crate::net::session::PendingPlayer;
use crate::state::AppState;

static USERNAME_REGEX: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 16, message = "Username must be 1-16 characters"))]
    #[validate(regex(
        path = "USERNAME_REGEX",
        message = "Username can only contain letters, numbers, and underscores"
    ))]
    pub username: String,
}

/// POST /api/v1/auth/login
///
/// Registers a pending player in the start room. The returned `session_id`
/// must be sent as the first message on a game stream to bind it.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginData>>, ApiError> {
    payload.validate()?;

    let pending = PendingPlayer::new(payload.username.as_str(), state.world.start_room());
    let session_id = pending.id;
    state.registry.register(pending)?;

    info!(username = %payload.username, %session_id, "Login accepted");
    Ok(Json(ApiResponse::success(
        "Session created",
        LoginData {
            session_id: session_id.to_string(),
        },
    )))
}

/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let data = HealthData {
        active: true,
        uptime_secs: state.uptime_secs(),
        active_users: state.registry.active_count(),
        pending_users: state.registry.pending_count(),
        capacity: state.registry.capacity(),
        version: crate::VERSION,
    };
    debug!(active = data.active_users, pending = data.pending_users, "Health check");
    Json(ApiResponse::success("OK", data))
}
