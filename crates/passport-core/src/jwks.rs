//! Public key set publication
//!
//! Derives the public half of every registered key and renders a JWKS
//! document. Only public values (`x`, `n`, `e`) are ever emitted.

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::Result;
use crate::keys::{KeyKind, KeyRegistry};

/// A public JWK entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum PublicJwk {
    /// Ed25519 public key
    #[serde(rename = "OKP")]
    Okp {
        crv: String,
        kid: String,
        alg: String,
        #[serde(rename = "use")]
        key_use: String,
        x: String,
    },
    /// RSA public key
    #[serde(rename = "RSA")]
    Rsa {
        kid: String,
        alg: String,
        #[serde(rename = "use")]
        key_use: String,
        n: String,
        e: String,
    },
}

impl PublicJwk {
    pub fn kid(&self) -> &str {
        match self {
            PublicJwk::Okp { kid, .. } | PublicJwk::Rsa { kid, .. } => kid,
        }
    }
}

/// Public key set document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<PublicJwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&PublicJwk> {
        self.keys.iter().find(|k| k.kid() == kid)
    }
}

/// Publish the public key set for every key in the registry, ordered by `kid`
pub fn publish(registry: &KeyRegistry) -> Result<JwkSet> {
    let mut keys = Vec::with_capacity(registry.len());

    for definition in registry.definitions() {
        let jwk = match &definition.kind {
            KeyKind::Ed25519Seed { seed } => {
                let public = crypto::ed25519_public_key(&definition.kid, seed)?;
                PublicJwk::Okp {
                    crv: "Ed25519".to_string(),
                    kid: definition.kid.clone(),
                    alg: "EdDSA".to_string(),
                    key_use: "sig".to_string(),
                    x: crypto::b64url_encode(public),
                }
            }
            // Only private components are held; n and e are published as stored.
            KeyKind::RsaPrivate(components) => PublicJwk::Rsa {
                kid: definition.kid.clone(),
                alg: "RS256".to_string(),
                key_use: "sig".to_string(),
                n: components.n.clone(),
                e: components.e.clone(),
            },
        };
        keys.push(jwk);
    }

    Ok(JwkSet { keys })
}
