//! Passport assembly
//!
//! A passport is a compact RS256 JWT whose `ga4gh` claim groups compact visas
//! by the trust domain that issued them:
//!
//! ```json
//! {
//!   "sub": "alice", "iss": "https://broker.example", "iat": 1, "exp": 2, "jti": "...",
//!   "ga4gh": { "vn": "1.2", "iss": { "https://dac.example": [ { "v": "...", "k": "...", "s": "..." } ] } }
//! }
//! ```

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{PassportError, Result};
use crate::keys::KeyRegistry;
use crate::visa::Visa;

/// GA4GH passport claim version
pub const GA4GH_VERSION: &str = "1.2";

/// Visas grouped by trust-domain issuer URL, serialized in key order
pub type VisasByTrustDomain = BTreeMap<String, Vec<Visa>>;

/// Unix expiry `ttl_secs` after `now`
pub fn expiry_after(now: i64, ttl_secs: u64) -> Result<i64> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(PassportError::InvalidLifetime(ttl_secs))
}

/// What to do when no trust domain produced a visa
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPassportPolicy {
    /// Refuse with `NoVisas`
    #[default]
    Reject,
    /// Issue a valid passport with no visas
    Issue,
}

/// The `ga4gh` claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ga4ghClaim {
    pub vn: String,
    pub iss: VisasByTrustDomain,
}

/// Full passport claim set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub ga4gh: Ga4ghClaim,
}

impl PassportClaims {
    /// Total number of visas across trust domains
    pub fn visa_count(&self) -> usize {
        self.ga4gh.iss.values().map(Vec::len).sum()
    }
}

/// Builds and signs passports with the registry's RSA key
#[derive(Debug, Clone, Copy)]
pub struct PassportAssembler<'a> {
    registry: &'a KeyRegistry,
    kid: &'a str,
    policy: EmptyPassportPolicy,
}

impl<'a> PassportAssembler<'a> {
    pub fn new(registry: &'a KeyRegistry, kid: &'a str) -> Self {
        Self {
            registry,
            kid,
            policy: EmptyPassportPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EmptyPassportPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Assemble and sign a passport, returning the compact token
    pub fn assemble(
        &self,
        subject: &str,
        issuer: &str,
        ttl: Duration,
        visas: VisasByTrustDomain,
    ) -> Result<String> {
        let jti = uuid::Uuid::new_v4().to_string();
        self.assemble_at(subject, issuer, ttl, visas, Utc::now().timestamp(), &jti)
    }

    /// Assemble with an explicit clock and token id
    pub fn assemble_at(
        &self,
        subject: &str,
        issuer: &str,
        ttl: Duration,
        visas: VisasByTrustDomain,
        now: i64,
        jti: &str,
    ) -> Result<String> {
        let signing_key = self.registry.rsa_signer(self.kid)?;

        let claims = PassportClaims {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            iat: now,
            exp: expiry_after(now, ttl.as_secs())?,
            jti: jti.to_string(),
            ga4gh: Ga4ghClaim {
                vn: GA4GH_VERSION.to_string(),
                iss: visas,
            },
        };

        if claims.visa_count() == 0 {
            match self.policy {
                EmptyPassportPolicy::Reject => {
                    warn!(sub = %subject, "Refusing to issue passport without visas");
                    return Err(PassportError::NoVisas);
                }
                EmptyPassportPolicy::Issue => {
                    info!(sub = %subject, "Issuing passport without visas");
                }
            }
        }

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.to_string());

        let token = encode(&header, &claims, signing_key)?;

        info!(
            sub = %subject,
            jti = %claims.jti,
            trust_domains = claims.ga4gh.iss.len(),
            visas = claims.visa_count(),
            "Assembled passport"
        );

        Ok(token)
    }
}

/// Verify a passport's RS256 signature and issuer, returning its claims
pub fn decode_passport(
    token: &str,
    key: &DecodingKey,
    expected_issuer: &str,
) -> Result<PassportClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[expected_issuer]);
    validation.validate_aud = false;
    let data = decode::<PassportClaims>(token, key, &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::{test_registry, test_rsa_components};
    use crate::visa::VisaSigner;

    fn decoding_key() -> DecodingKey {
        let c = test_rsa_components();
        DecodingKey::from_rsa_components(&c.n, &c.e).unwrap()
    }

    fn one_visa(registry: &KeyRegistry) -> VisasByTrustDomain {
        let visa = VisaSigner::new(registry)
            .sign("c:ds et:9999999999 iu:alice iv:j", "visa-key")
            .unwrap();
        let mut map = BTreeMap::new();
        map.insert("https://dac.example".to_string(), vec![visa]);
        map
    }

    #[test]
    fn test_assemble_and_decode() {
        let registry = test_registry();
        let token = PassportAssembler::new(&registry, "passport-key")
            .assemble("alice", "https://broker.example", Duration::from_secs(3600), one_visa(&registry))
            .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("passport-key"));
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let claims = decode_passport(&token, &decoding_key(), "https://broker.example").unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.ga4gh.vn, "1.2");
        assert_eq!(claims.visa_count(), 1);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_fixed_clock_claims() {
        let registry = test_registry();
        let now = Utc::now().timestamp();
        let token = PassportAssembler::new(&registry, "passport-key")
            .assemble_at("alice", "iss", Duration::from_secs(60), one_visa(&registry), now, "fixed-jti")
            .unwrap();
        let claims = decode_passport(&token, &decoding_key(), "iss").unwrap();
        assert_eq!(claims.iat, now);
        assert_eq!(claims.exp, now + 60);
        assert_eq!(claims.jti, "fixed-jti");
    }

    #[test]
    fn test_expiry_overflow_rejected() {
        assert_eq!(expiry_after(100, 60).unwrap(), 160);
        assert!(matches!(
            expiry_after(100, u64::MAX),
            Err(PassportError::InvalidLifetime(u64::MAX))
        ));
        assert!(matches!(
            expiry_after(i64::MAX - 10, 60),
            Err(PassportError::InvalidLifetime(60))
        ));

        let registry = test_registry();
        let result = PassportAssembler::new(&registry, "passport-key").assemble(
            "alice",
            "iss",
            Duration::from_secs(u64::MAX),
            one_visa(&registry),
        );
        assert!(matches!(result, Err(PassportError::InvalidLifetime(_))));
    }

    #[test]
    fn test_fresh_jti_per_passport() {
        let registry = test_registry();
        let assembler = PassportAssembler::new(&registry, "passport-key");
        let ttl = Duration::from_secs(60);
        let a = assembler.assemble("s", "iss", ttl, one_visa(&registry)).unwrap();
        let b = assembler.assemble("s", "iss", ttl, one_visa(&registry)).unwrap();
        let key = decoding_key();
        assert_ne!(
            decode_passport(&a, &key, "iss").unwrap().jti,
            decode_passport(&b, &key, "iss").unwrap().jti
        );
    }

    #[test]
    fn test_empty_passport_rejected_by_default() {
        let registry = test_registry();
        let mut visas = BTreeMap::new();
        visas.insert("https://dac.example".to_string(), Vec::new());
        let result = PassportAssembler::new(&registry, "passport-key").assemble(
            "alice",
            "iss",
            Duration::from_secs(60),
            visas,
        );
        assert!(matches!(result, Err(PassportError::NoVisas)));
    }

    #[test]
    fn test_empty_passport_issued_when_allowed() {
        let registry = test_registry();
        let token = PassportAssembler::new(&registry, "passport-key")
            .with_policy(EmptyPassportPolicy::Issue)
            .assemble("alice", "iss", Duration::from_secs(60), BTreeMap::new())
            .unwrap();
        let claims = decode_passport(&token, &decoding_key(), "iss").unwrap();
        assert_eq!(claims.visa_count(), 0);
    }

    #[test]
    fn test_passport_key_must_be_rsa() {
        let registry = test_registry();
        let result = PassportAssembler::new(&registry, "visa-key").assemble(
            "alice",
            "iss",
            Duration::from_secs(60),
            one_visa(&registry),
        );
        assert!(matches!(result, Err(PassportError::WrongKeyKind { .. })));

        let result = PassportAssembler::new(&registry, "missing").assemble(
            "alice",
            "iss",
            Duration::from_secs(60),
            one_visa(&registry),
        );
        assert!(matches!(result, Err(PassportError::UnknownKey(_))));
    }

    #[test]
    fn test_wrong_issuer_rejected_on_decode() {
        let registry = test_registry();
        let token = PassportAssembler::new(&registry, "passport-key")
            .assemble("alice", "iss-a", Duration::from_secs(60), one_visa(&registry))
            .unwrap();
        assert!(decode_passport(&token, &decoding_key(), "iss-b").is_err());
    }
}
