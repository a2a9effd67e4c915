//! Error types for the passport bridge

use thiserror::Error;

/// Result type for upstream verification
pub type Result<T> = std::result::Result<T, VerifierError>;

/// Errors raised while verifying an upstream identity token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// Token could not be parsed, uses a forbidden algorithm, or lacks a required claim
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// Signature did not verify against the issuer's published key
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// `iss` claim is not the configured upstream issuer
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch { expected: String, actual: String },

    /// `exp` is in the past
    #[error("Token expired at {0}")]
    TokenExpired(i64),

    /// No verifier configuration exists for the requested issuer
    #[error("Unknown issuer: {0}")]
    UnknownIssuer(String),

    /// The issuer's key set could not be retrieved
    #[error("Failed to fetch key set for {issuer}: {reason}")]
    KeyFetchFailed { issuer: String, reason: String },
}

impl From<jsonwebtoken::errors::Error> for VerifierError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_) => VerifierError::SignatureInvalid(err.to_string()),
            _ => VerifierError::TokenMalformed(err.to_string()),
        }
    }
}

/// Errors raised while gathering business facts for a trust domain
#[derive(Error, Debug)]
pub enum FactError {
    /// A fact provider was unreachable, returned an error, or timed out
    #[error("Fact provider '{provider}' unavailable: {reason}")]
    FactProviderUnavailable { provider: String, reason: String },

    /// A provider returned a value that cannot form an assertion token
    #[error(transparent)]
    InvalidAssertion(#[from] passport_core::PassportError),
}

impl FactError {
    pub fn unavailable(provider: &str, reason: impl std::fmt::Display) -> Self {
        FactError::FactProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
