//! Key Registry
//!
//! Immutable mapping from key identifier (`kid`) to private key material.
//! Two kinds of keys are held:
//! - Ed25519 seeds, used to sign compact visas
//! - RSA private keys, used to sign the outer passport under RS256
//!
//! The registry is built once at start-up and shared by reference. All key
//! material is validated during construction so that a malformed key stops
//! the broker from starting instead of failing individual requests.

use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use crate::crypto;
use crate::error::{PassportError, Result};

/// Length of an Ed25519 seed in bytes
pub const ED25519_SEED_LEN: usize = 32;

/// RSA private key components, base64url-encoded big-endian integers
/// exactly as they appear in a private JWK
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RsaComponents {
    pub n: String,
    pub e: String,
    pub d: String,
    pub p: String,
    pub q: String,
    pub dp: String,
    pub dq: String,
    pub qi: String,
}

/// Kind of key material held under a `kid`
#[derive(Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// Raw Ed25519 seed (must be 32 bytes)
    Ed25519Seed { seed: Vec<u8> },
    /// RSA private key components
    RsaPrivate(RsaComponents),
}

impl KeyKind {
    /// Short human-readable name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            KeyKind::Ed25519Seed { .. } => "Ed25519",
            KeyKind::RsaPrivate(_) => "RSA",
        }
    }
}

/// A registered key
#[derive(Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub kid: String,
    pub kind: KeyKind,
}

impl KeyDefinition {
    /// Create an Ed25519 key definition from a raw seed
    pub fn ed25519(kid: impl Into<String>, seed: impl Into<Vec<u8>>) -> Self {
        Self {
            kid: kid.into(),
            kind: KeyKind::Ed25519Seed { seed: seed.into() },
        }
    }

    /// Create an RSA key definition from private JWK components
    pub fn rsa(kid: impl Into<String>, components: RsaComponents) -> Self {
        Self {
            kid: kid.into(),
            kind: KeyKind::RsaPrivate(components),
        }
    }
}

impl fmt::Debug for KeyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDefinition")
            .field("kid", &self.kid)
            .field("kind", &self.kind.name())
            .finish()
    }
}

/// Read-only key registry
pub struct KeyRegistry {
    keys: HashMap<String, KeyDefinition>,
    /// Prepared RS256 signing keys, one per RSA definition
    rsa_signers: HashMap<String, EncodingKey>,
}

impl KeyRegistry {
    /// Build a registry, validating every key
    ///
    /// Fails with `InvalidKeyMaterial` on a malformed seed, inconsistent RSA
    /// components, or a duplicate `kid`.
    pub fn new(definitions: Vec<KeyDefinition>) -> Result<Self> {
        let mut keys = HashMap::with_capacity(definitions.len());
        let mut rsa_signers = HashMap::new();

        for definition in definitions {
            if definition.kid.is_empty() {
                return Err(PassportError::invalid_key("", "empty key id"));
            }
            if keys.contains_key(&definition.kid) {
                return Err(PassportError::invalid_key(&definition.kid, "duplicate key id"));
            }

            match &definition.kind {
                KeyKind::Ed25519Seed { seed } => {
                    if seed.len() != ED25519_SEED_LEN {
                        return Err(PassportError::invalid_key(
                            &definition.kid,
                            format!(
                                "Ed25519 seed must be {} bytes, got {}",
                                ED25519_SEED_LEN,
                                seed.len()
                            ),
                        ));
                    }
                }
                KeyKind::RsaPrivate(components) => {
                    let signer = crypto::rsa_encoding_key(&definition.kid, components)?;
                    rsa_signers.insert(definition.kid.clone(), signer);
                }
            }

            info!(kid = %definition.kid, kind = definition.kind.name(), "Registered key");
            keys.insert(definition.kid.clone(), definition);
        }

        Ok(Self { keys, rsa_signers })
    }

    /// Look up a key by identifier
    pub fn lookup(&self, kid: &str) -> Result<&KeyDefinition> {
        self.keys
            .get(kid)
            .ok_or_else(|| PassportError::UnknownKey(kid.to_string()))
    }

    /// Check if a key is registered
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// All registered key identifiers, sorted
    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.keys.keys().cloned().collect();
        kids.sort();
        kids
    }

    /// All definitions, sorted by `kid`
    pub fn definitions(&self) -> Vec<&KeyDefinition> {
        let mut defs: Vec<&KeyDefinition> = self.keys.values().collect();
        defs.sort_by(|a, b| a.kid.cmp(&b.kid));
        defs
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Prepared RS256 signing key for `kid`
    pub(crate) fn rsa_signer(&self, kid: &str) -> Result<&EncodingKey> {
        let definition = self.lookup(kid)?;
        match &definition.kind {
            KeyKind::RsaPrivate(_) => self
                .rsa_signers
                .get(kid)
                .ok_or_else(|| PassportError::UnknownKey(kid.to_string())),
            other => Err(PassportError::WrongKeyKind {
                kid: kid.to_string(),
                expected: "RSA",
                actual: other.name(),
            }),
        }
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("kids", &self.kids())
            .finish()
    }
}
