//! Token Exchange Handler
//!
//! `POST /token` accepts the RFC 8693 parameters as a form body, or as a
//! JSON object for clients that cannot send forms.

use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    response::IntoResponse,
    Form, Json,
};
use passport_core::{publish, JwkSet, PassportError};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::exchange::{ExchangeRequest, TokenExchangeService};

/// Application state shared across handlers
pub struct AppState {
    /// Exchange pipeline
    pub service: TokenExchangeService,
    /// Public key set, derived once from the registry
    pub jwks: JwkSet,
}

impl AppState {
    pub fn new(service: TokenExchangeService) -> Result<Self, PassportError> {
        let jwks = publish(service.registry())?;
        info!(keys = jwks.keys.len(), "Published JWKS");
        Ok(Self { service, jwks })
    }
}

/// Exchange request parsed from either body encoding
#[derive(Debug)]
pub struct TokenRequest(pub ExchangeRequest);

impl<S> FromRequest<S> for TokenRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(request) = Json::<ExchangeRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            Ok(Self(request))
        } else {
            let Form(request) = Form::<ExchangeRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            Ok(Self(request))
        }
    }
}

/// Exchange an upstream access token for a passport
///
/// POST /token
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    TokenRequest(request): TokenRequest,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.exchange(&request).await?;

    Ok((
        [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
        Json(response),
    ))
}
