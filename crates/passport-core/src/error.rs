//! Error types for passport issuance

use thiserror::Error;

/// Result type alias using PassportError
pub type Result<T> = std::result::Result<T, PassportError>;

/// Errors raised while loading keys, building assertions, or signing
#[derive(Error, Debug)]
pub enum PassportError {
    /// No key registered under this identifier
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// The key exists but is the wrong kind for the requested operation
    #[error("Key '{kid}' is {actual}, expected {expected}")]
    WrongKeyKind {
        kid: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// An Ed25519 seed was not exactly 32 bytes at signing time
    #[error("Invalid Ed25519 seed length for key '{kid}': {len} bytes")]
    InvalidSeedLength { kid: String, len: usize },

    /// Key material rejected while building the registry
    #[error("Invalid key material for '{kid}': {reason}")]
    InvalidKeyMaterial { kid: String, reason: String },

    /// Key kind that cannot be registered or published
    #[error("Unsupported key kind: {0}")]
    UnsupportedKeyKind(String),

    /// Assertion token that would corrupt the signed content string
    #[error("Invalid assertion token: {0}")]
    InvalidAssertion(String),

    /// Token lifetime cannot be represented as a unix expiry
    #[error("Lifetime of {0}s is out of range")]
    InvalidLifetime(u64),

    /// Every trust domain produced an empty visa list
    #[error("No visas to include in passport")]
    NoVisas,

    /// Signing primitive failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PassportError {
    pub(crate) fn invalid_key(kid: &str, reason: impl Into<String>) -> Self {
        PassportError::InvalidKeyMaterial {
            kid: kid.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PassportError {
    fn from(err: serde_json::Error) -> Self {
        PassportError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for PassportError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        PassportError::Signing(err.to_string())
    }
}
