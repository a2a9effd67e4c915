//! Upstream token verification
//!
//! Verifies bearer tokens issued by the upstream identity provider against
//! the issuer's remote key set. Key sets are cached per issuer; concurrent
//! misses for the same issuer share a single in-flight fetch.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, VerifierError};
use crate::types::VerifiedSubject;

/// Configuration for a trusted upstream issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtIssuerConfig {
    /// The issuer identifier (iss claim)
    pub issuer: String,

    /// URL to fetch JWKS from
    pub jwks_url: String,

    /// Clock skew tolerated on `exp` (seconds)
    #[serde(default)]
    pub leeway_secs: u64,
}

impl JwtIssuerConfig {
    pub fn new(issuer: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_url: jwks_url.into(),
            leeway_secs: 0,
        }
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }
}

/// Remote JWKS document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteKeySet {
    pub keys: Vec<RemoteJwk>,
}

/// Individual public JWK as published by an upstream issuer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteJwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC / OKP curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate, or the OKP public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl RemoteJwk {
    fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map_or(true, |u| u == "sig")
    }

    fn component<'a>(&self, value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value.as_deref().ok_or_else(|| {
            VerifierError::SignatureInvalid(format!("{} key missing '{}'", self.kty, name))
        })
    }

    fn decoding_key(&self) -> Result<DecodingKey> {
        match self.kty.as_str() {
            "RSA" => Ok(DecodingKey::from_rsa_components(
                self.component(&self.n, "n")?,
                self.component(&self.e, "e")?,
            )?),
            "EC" => Ok(DecodingKey::from_ec_components(
                self.component(&self.x, "x")?,
                self.component(&self.y, "y")?,
            )?),
            "OKP" => Ok(DecodingKey::from_ed_components(self.component(&self.x, "x")?)?),
            kty => Err(VerifierError::SignatureInvalid(format!(
                "unsupported key type '{}'",
                kty
            ))),
        }
    }
}

impl RemoteKeySet {
    /// Find a key by id; without a `kid` the first signing key is used
    fn find(&self, kid: Option<&str>) -> Option<&RemoteJwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None => self.keys.iter().find(|k| k.is_signing_key()),
        }
    }
}

/// Where remote key sets come from
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the key set published at `jwks_url`
    async fn fetch(&self, issuer: &str, jwks_url: &str) -> Result<RemoteKeySet>;
}

/// Fetches key sets over HTTP with a per-attempt timeout and bounded retry
pub struct HttpKeySetSource {
    client: reqwest::Client,
    attempt_timeout: Duration,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl HttpKeySetSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            attempt_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    async fn fetch_once(&self, jwks_url: &str) -> std::result::Result<RemoteKeySet, reqwest::Error> {
        self.client
            .get(jwks_url)
            .timeout(self.attempt_timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<RemoteKeySet>()
            .await
    }
}

impl Default for HttpKeySetSource {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self, issuer: &str, jwks_url: &str) -> Result<RemoteKeySet> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            debug!(issuer = %issuer, url = %jwks_url, attempt, "Fetching JWKS");
            match self.fetch_once(jwks_url).await {
                Ok(set) => return Ok(set),
                Err(e) => {
                    // 4xx will not fix itself
                    let permanent = e.status().is_some_and(|s| s.is_client_error());
                    if permanent || attempt >= self.max_attempts {
                        return Err(VerifierError::KeyFetchFailed {
                            issuer: issuer.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    warn!(
                        issuer = %issuer,
                        attempt,
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "JWKS fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

/// Claims every upstream token must carry
#[derive(Debug, Deserialize)]
struct RequiredClaims {
    iss: Option<String>,
    sub: Option<String>,
    exp: Option<i64>,
}

/// Default minimum age of a cached key set before an unknown `kid` may
/// trigger a refetch
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// A key set together with the moment it was fetched
#[derive(Debug)]
struct CachedKeySet {
    set: RemoteKeySet,
    fetched_at: Instant,
}

/// Verifies upstream bearer tokens
pub struct UpstreamVerifier {
    /// Trusted issuers
    issuers: HashMap<String, JwtIssuerConfig>,
    /// JWKS cache (issuer -> key set)
    cache: Cache<String, Arc<CachedKeySet>>,
    source: Arc<dyn KeySetSource>,
    min_refresh_interval: Duration,
}

impl UpstreamVerifier {
    pub fn new(source: Arc<dyn KeySetSource>, cache_ttl: Duration) -> Self {
        Self {
            issuers: HashMap::new(),
            cache: Cache::builder()
                .time_to_live(cache_ttl)
                .max_capacity(100)
                .build(),
            source,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Minimum age of a cached key set before an unknown `kid` refetches it
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Add a trusted issuer
    pub fn with_issuer(mut self, config: JwtIssuerConfig) -> Self {
        self.issuers.insert(config.issuer.clone(), config);
        self
    }

    /// Key set for an issuer, fetched at most once per miss
    async fn key_set(&self, config: &JwtIssuerConfig) -> Result<Arc<CachedKeySet>> {
        let source = Arc::clone(&self.source);
        let issuer = config.issuer.clone();
        let url = config.jwks_url.clone();

        self.cache
            .try_get_with(config.issuer.clone(), async move {
                let set = source.fetch(&issuer, &url).await?;
                info!(issuer = %issuer, keys = set.keys.len(), "Cached JWKS");
                Ok::<_, VerifierError>(Arc::new(CachedKeySet {
                    set,
                    fetched_at: Instant::now(),
                }))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Locate the verification key
    ///
    /// An unknown `kid` refetches the key set once, and only when the cached
    /// set is older than the minimum refresh interval.
    async fn resolve_key(&self, config: &JwtIssuerConfig, kid: Option<&str>) -> Result<DecodingKey> {
        let cached = self.key_set(config).await?;
        if let Some(jwk) = cached.set.find(kid) {
            return jwk.decoding_key();
        }

        if cached.fetched_at.elapsed() < self.min_refresh_interval {
            debug!(issuer = %config.issuer, kid = ?kid, "Key not in fresh JWKS, not refreshing");
            return Err(unknown_kid(kid));
        }

        // Only evict the entry this caller saw; a concurrent refresh may
        // already have replaced it.
        if let Some(current) = self.cache.get(&config.issuer).await {
            if Arc::ptr_eq(&current, &cached) {
                debug!(issuer = %config.issuer, kid = ?kid, "Key not in cached JWKS, refreshing");
                self.cache.invalidate(&config.issuer).await;
            }
        }
        let refreshed = self.key_set(config).await?;
        refreshed
            .set
            .find(kid)
            .ok_or_else(|| unknown_kid(kid))?
            .decoding_key()
    }

    /// Verify a bearer token issued by `expected_issuer`
    ///
    /// Checks run in order: header, signature, `iss`, `exp`, `sub`.
    pub async fn verify(&self, token: &str, expected_issuer: &str) -> Result<VerifiedSubject> {
        let header = decode_header(token)
            .map_err(|e| VerifierError::TokenMalformed(e.to_string()))?;
        let alg = header.alg;
        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(VerifierError::TokenMalformed(format!(
                "algorithm {:?} not accepted",
                alg
            )));
        }

        let config = self
            .issuers
            .get(expected_issuer)
            .ok_or_else(|| VerifierError::UnknownIssuer(expected_issuer.to_string()))?;

        let decoding_key = self.resolve_key(config, header.kid.as_deref()).await?;

        // Signature only; claims are checked below in a fixed order
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let raw_claims =
            decode::<serde_json::Map<String, serde_json::Value>>(token, &decoding_key, &validation)?
                .claims;
        let claims: RequiredClaims =
            serde_json::from_value(serde_json::Value::Object(raw_claims.clone()))
                .map_err(|e| VerifierError::TokenMalformed(e.to_string()))?;

        let issuer = claims.iss.unwrap_or_default();
        if issuer != expected_issuer {
            return Err(VerifierError::IssuerMismatch {
                expected: expected_issuer.to_string(),
                actual: issuer,
            });
        }

        let exp = claims
            .exp
            .ok_or_else(|| VerifierError::TokenMalformed("missing 'exp' claim".into()))?;
        let now = Utc::now().timestamp();
        if exp <= now - config.leeway_secs as i64 {
            return Err(VerifierError::TokenExpired(exp));
        }

        let subject = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VerifierError::TokenMalformed("missing 'sub' claim".into()))?;

        debug!(issuer = %issuer, subject = %subject, "Upstream token verified");
        Ok(VerifiedSubject {
            subject,
            raw_claims,
        })
    }
}

fn unknown_kid(kid: Option<&str>) -> VerifierError {
    VerifierError::SignatureInvalid(format!(
        "no key '{}' published by issuer",
        kid.unwrap_or("<none>")
    ))
}
