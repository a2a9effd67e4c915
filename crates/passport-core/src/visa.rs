//! Compact visas
//!
//! A compact visa is not a JWT. It is a three-field object:
//!
//! ```json
//! { "v": "<content>", "k": "<kid>", "s": "<base64url Ed25519 signature>" }
//! ```
//!
//! Each visa is independently verifiable with the public key published
//! under `k` in the broker's JWKS.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assertion::{parse_content, AssertionToken};
use crate::crypto;
use crate::error::{PassportError, Result};
use crate::keys::{KeyKind, KeyRegistry};

/// A signed compact visa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visa {
    /// Signed content string
    #[serde(rename = "v")]
    pub content: String,
    /// Key identifier of the signing key
    #[serde(rename = "k")]
    pub kid: String,
    /// Base64url (unpadded) Ed25519 signature over `content`
    #[serde(rename = "s")]
    pub signature: String,
}

impl Visa {
    /// Decoded signature bytes
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        crypto::b64url_decode(&self.signature)
            .map_err(|e| PassportError::Signing(format!("Invalid signature encoding: {}", e)))
    }

    /// Verify the signature against an Ed25519 public key
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        let signature = self.signature_bytes()?;
        crypto::ed25519_verify(key, self.content.as_bytes(), &signature)
    }

    /// Verify the signature against a published `x` value (base64url public key)
    pub fn verify_with_x(&self, x: &str) -> Result<()> {
        let bytes = crypto::b64url_decode(x)
            .map_err(|e| PassportError::Signing(format!("Invalid public key encoding: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PassportError::Signing("Invalid public key length".into()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| PassportError::Signing(e.to_string()))?;
        self.verify(&key)
    }

    /// Content split into its assertion tokens
    pub fn tokens(&self) -> Result<Vec<AssertionToken>> {
        parse_content(&self.content)
    }
}

/// Signs visa content strings with Ed25519 keys from the registry
#[derive(Debug, Clone, Copy)]
pub struct VisaSigner<'a> {
    registry: &'a KeyRegistry,
}

impl<'a> VisaSigner<'a> {
    pub fn new(registry: &'a KeyRegistry) -> Self {
        Self { registry }
    }

    /// Sign `content` under `kid`
    ///
    /// The key must be an Ed25519 seed. Signing is deterministic, so the
    /// same content and key always yield the same visa.
    pub fn sign(&self, content: &str, kid: &str) -> Result<Visa> {
        let definition = self.registry.lookup(kid)?;
        let seed = match &definition.kind {
            KeyKind::Ed25519Seed { seed } => seed,
            other => {
                return Err(PassportError::WrongKeyKind {
                    kid: kid.to_string(),
                    expected: "Ed25519",
                    actual: other.name(),
                })
            }
        };

        let signing_key = crypto::ed25519_signing_key(kid, seed)?;
        let signature = crypto::ed25519_sign(&signing_key, content.as_bytes());

        debug!(kid = %kid, len = content.len(), "Signed visa");

        Ok(Visa {
            content: content.to_string(),
            kid: kid.to_string(),
            signature: crypto::b64url_encode(signature),
        })
    }
}
