//! API module for the passport broker

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub issuer: String,
    pub passport_kid: String,
    pub kids: Vec<String>,
    pub trust_domain_count: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let settings = state.service.settings();

    Json(ReadyResponse {
        ready: true,
        issuer: settings.issuer.clone(),
        passport_kid: settings.passport_kid.clone(),
        kids: state.service.registry().kids(),
        trust_domain_count: settings.trust_domains.len(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Relying parties fetch the key set from browsers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Key publication
        .route("/.well-known/jwks.json", get(handlers::jwks))
        // Token exchange
        .route("/token", post(handlers::exchange_token))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
