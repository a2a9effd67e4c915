//! Private key-set loading
//!
//! Signing keys are provisioned as a private JWK set:
//!
//! ```json
//! {"keys": [
//!   {"kty": "OKP", "crv": "Ed25519", "kid": "visa-key", "d": "<seed>"},
//!   {"kty": "RSA", "kid": "passport-key", "n": "...", "e": "...", "d": "...",
//!    "p": "...", "q": "...", "dp": "...", "dq": "...", "qi": "..."}
//! ]}
//! ```
//!
//! Anything that does not parse into a valid registry stops the broker
//! from starting.

use passport_core::{
    crypto::b64url_decode, KeyDefinition, KeyRegistry, PassportError, RsaComponents,
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;

#[derive(Deserialize)]
struct PrivateKeySet {
    keys: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct KeyHeader {
    kid: String,
    kty: String,
    #[serde(default)]
    crv: Option<String>,
}

#[derive(Deserialize)]
struct OkpPrivate {
    d: String,
}

fn parse_key(value: serde_json::Value) -> Result<KeyDefinition, PassportError> {
    let header: KeyHeader = serde_json::from_value(value.clone())?;

    match (header.kty.as_str(), header.crv.as_deref()) {
        ("OKP", Some("Ed25519")) => {
            let okp: OkpPrivate = serde_json::from_value(value)?;
            let seed = b64url_decode(&okp.d).map_err(|e| PassportError::InvalidKeyMaterial {
                kid: header.kid.clone(),
                reason: format!("'d' is not base64url: {}", e),
            })?;
            Ok(KeyDefinition::ed25519(header.kid, seed))
        }
        ("RSA", _) => {
            let components: RsaComponents = serde_json::from_value(value)?;
            Ok(KeyDefinition::rsa(header.kid, components))
        }
        (kty, crv) => Err(PassportError::UnsupportedKeyKind(match crv {
            Some(crv) => format!("{}/{} ({})", kty, crv, header.kid),
            None => format!("{} ({})", kty, header.kid),
        })),
    }
}

/// Parse a private JWK set document into a key registry
pub fn parse_key_set(json: &str) -> Result<KeyRegistry, PassportError> {
    let set: PrivateKeySet = serde_json::from_str(json)?;
    let definitions = set
        .keys
        .into_iter()
        .map(parse_key)
        .collect::<Result<Vec<_>, _>>()?;
    KeyRegistry::new(definitions)
}

/// Load the key registry from a private JWK set file
pub fn load_key_file(path: impl AsRef<Path>) -> Result<KeyRegistry, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let registry = parse_key_set(&json)?;

    info!(
        path = %path.display(),
        kids = ?registry.kids(),
        "Loaded signing keys"
    );
    Ok(registry)
}
