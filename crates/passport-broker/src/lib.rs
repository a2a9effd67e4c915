//! Passport Broker
//!
//! The broker exchanges an upstream identity provider's access token for a
//! GA4GH passport (RFC 8693 token exchange):
//! - Verifies the subject token against the upstream JWKS
//! - Collects business facts per trust domain and signs one compact visa each
//! - Bundles the visas into an RS256 passport
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with key ids and trust domains
//! - `GET /.well-known/jwks.json` - Public keys for visas and passports
//! - `POST /token` - Token exchange (form or JSON body)

pub mod api;
pub mod config;
pub mod exchange;
pub mod keys;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{BrokerConfig, ConfigError};
pub use exchange::{
    ExchangeError, ExchangeRequest, ExchangeResponse, ExchangeSettings, ExchangeState,
    TokenExchangeService, ACCESS_TOKEN_TYPE, COMPACT_PASSPORT_TYPE, TOKEN_EXCHANGE_GRANT,
};
pub use keys::{load_key_file, parse_key_set};
