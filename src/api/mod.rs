//! REST API module for the Muddy server
//!
//! This module provides HTTP endpoints for:
//! - Login, which issues the pending id a game stream binds with
//! - Health reporting
//! - Optionally serving the bundled browser client

pub mod error;
pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeFile,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::state::AppState;

/// API version prefix
pub const API_VERSION: &str = "v1";

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new().route("/login", post(handlers::login));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(handlers::health));

    let mut router = Router::new().nest(&format!("/api/{}", API_VERSION), api_routes);

    if let Some(path) = &state.config.static_client_path {
        if path.exists() {
            info!(path = %path.display(), "Serving web client at /game-client");
            router = router.route_service("/game-client", ServeFile::new(path));
        } else {
            warn!(path = %path.display(), "Web client file not found, /game-client disabled");
        }
    }

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::game::world::fixtures::sample_world;

    fn state(max_players: usize) -> Arc<AppState> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = ServerConfig {
            max_players,
            ..Default::default()
        };
        Arc::new(AppState::new(config, sample_world(), shutdown_tx))
    }

    fn login_request(username: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "username": username }).to_string(),
            ))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login_creates_pending_session() {
        let state = state(2);
        let response = create_router(Arc::clone(&state))
            .oneshot(login_request("pat"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);

        let id = body["data"]["session_id"].as_str().unwrap();
        let id = uuid::Uuid::parse_str(id).unwrap();
        assert!(state.registry.is_pending(&id));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_username() {
        let state = state(2);
        for username in ["", "has space", "seventeen_chars_x"] {
            let response = create_router(Arc::clone(&state))
                .oneshot(login_request(username))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", username);
            let body = json_body(response).await;
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
        assert_eq!(state.registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_login_when_full() {
        let state = state(1);
        let first = create_router(Arc::clone(&state))
            .oneshot(login_request("pat"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = create_router(Arc::clone(&state))
            .oneshot(login_request("sam"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(second).await;
        assert_eq!(body["code"], "WORLD_FULL");
        assert_eq!(body["message"], "Max player limit reached, please try again");
    }

    #[tokio::test]
    async fn test_health_reports_occupancy() {
        let state = state(3);
        create_router(Arc::clone(&state))
            .oneshot(login_request("pat"))
            .await
            .unwrap();

        let response = create_router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["active"], true);
        assert_eq!(body["data"]["pending_users"], 1);
        assert_eq!(body["data"]["active_users"], 0);
        assert_eq!(body["data"]["capacity"], 3);
        assert_eq!(body["data"]["version"], crate::VERSION);
    }
}
