//! API request handlers

pub mod exchange;
pub mod keys;

pub use exchange::{exchange_token, AppState, TokenRequest};
pub use keys::jwks;
