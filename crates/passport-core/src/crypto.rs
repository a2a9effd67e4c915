//! Cryptographic primitives for visas and passports
//!
//! - Ed25519 key derivation from a raw 32-byte seed (RFC 8032 §5.1.5)
//! - Deterministic Ed25519 signatures over visa content strings
//! - RS256 signing keys prepared from private JWK components

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PrivateKeyParts;
use rsa::{BigUint, RsaPrivateKey};

use crate::error::{PassportError, Result};
use crate::keys::{RsaComponents, ED25519_SEED_LEN};

/// Length of an Ed25519 signature in bytes
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// Derive the Ed25519 signing key for a seed
///
/// Re-checks the seed length even though the registry already validated it.
pub fn ed25519_signing_key(kid: &str, seed: &[u8]) -> Result<SigningKey> {
    let seed: &[u8; ED25519_SEED_LEN] =
        seed.try_into().map_err(|_| PassportError::InvalidSeedLength {
            kid: kid.to_string(),
            len: seed.len(),
        })?;
    Ok(SigningKey::from_bytes(seed))
}

/// Derive the 32-byte Ed25519 public key point for a seed
pub fn ed25519_public_key(kid: &str, seed: &[u8]) -> Result<[u8; 32]> {
    Ok(ed25519_signing_key(kid, seed)?.verifying_key().to_bytes())
}

/// Sign a message with Ed25519. Same key and message always give the same bytes.
pub fn ed25519_sign(signing_key: &SigningKey, message: &[u8]) -> [u8; ED25519_SIGNATURE_LEN] {
    signing_key.sign(message).to_bytes()
}

/// Verify an Ed25519 signature
pub fn ed25519_verify(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::from_slice(signature)
        .map_err(|e| PassportError::Signing(format!("Invalid signature encoding: {}", e)))?;
    key.verify(message, &signature)
        .map_err(|e| PassportError::Signing(e.to_string()))
}

/// Encode bytes as unpadded base64url
pub fn b64url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded (or padded) base64url
pub fn b64url_decode(value: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value.trim_end_matches('='))
}

fn decode_component(kid: &str, name: &str, value: &str) -> Result<BigUint> {
    let bytes = b64url_decode(value).map_err(|e| {
        PassportError::invalid_key(kid, format!("RSA component '{}' is not base64url: {}", name, e))
    })?;
    if bytes.is_empty() {
        return Err(PassportError::invalid_key(
            kid,
            format!("RSA component '{}' is empty", name),
        ));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Build an RS256 signing key from private JWK components
///
/// The CRT exponents supplied with the key must agree with the ones derived
/// from `d`, `p` and `q`, so a truncated or mixed-up key file is rejected.
pub fn rsa_encoding_key(kid: &str, components: &RsaComponents) -> Result<EncodingKey> {
    let n = decode_component(kid, "n", &components.n)?;
    let e = decode_component(kid, "e", &components.e)?;
    let d = decode_component(kid, "d", &components.d)?;
    let p = decode_component(kid, "p", &components.p)?;
    let q = decode_component(kid, "q", &components.q)?;
    let dp = decode_component(kid, "dp", &components.dp)?;
    let dq = decode_component(kid, "dq", &components.dq)?;
    decode_component(kid, "qi", &components.qi)?;

    let mut key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| PassportError::invalid_key(kid, e.to_string()))?;
    key.validate()
        .map_err(|e| PassportError::invalid_key(kid, e.to_string()))?;
    key.precompute()
        .map_err(|e| PassportError::invalid_key(kid, e.to_string()))?;

    if key.dp() != Some(&dp) || key.dq() != Some(&dq) {
        return Err(PassportError::invalid_key(
            kid,
            "CRT exponents do not match private exponent",
        ));
    }

    let der = key
        .to_pkcs1_der()
        .map_err(|e| PassportError::invalid_key(kid, e.to_string()))?;
    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}
