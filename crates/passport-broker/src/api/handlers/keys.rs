//! Public key publication

use axum::{extract::State, http::header, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::handlers::exchange::AppState;

/// Public key set for verifying visas and passports
///
/// GET /.well-known/jwks.json
pub async fn jwks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(state.jwks.clone()),
    )
}
