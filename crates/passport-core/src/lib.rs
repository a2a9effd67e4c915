//! # Passport Core
//!
//! Key material and signing for GA4GH passports with compact visas.
//!
//! ## Key Concepts
//!
//! - **Key Registry**: immutable `kid` → private key map (Ed25519 seeds, RSA keys)
//! - **Assertion token**: a `<tag>:<value>` string such as `c:<dataset>` or `et:<expiry>`
//! - **Visa**: `{v, k, s}`, an Ed25519 signature over a sorted token string
//! - **Passport**: RS256 JWT grouping visas by trust domain under `ga4gh.iss`
//! - **JWKS**: public halves of the registered keys
//!
//! Nothing in this crate performs I/O.

pub mod assertion;
pub mod crypto;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod passport;
pub mod visa;

pub use assertion::{build_content, AssertionFact, AssertionToken, TRUSTED_RESEARCHER};
pub use error::{PassportError, Result};
pub use jwks::{publish, JwkSet, PublicJwk};
pub use keys::{KeyDefinition, KeyKind, KeyRegistry, RsaComponents};
pub use passport::{
    decode_passport, expiry_after, EmptyPassportPolicy, PassportAssembler, PassportClaims, VisasByTrustDomain,
};
pub use visa::{Visa, VisaSigner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
