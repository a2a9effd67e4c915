//! Shared fixtures for broker integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use jsonwebtoken::DecodingKey;
use passport_bridge::{
    ApprovedAccessProvider, AssertionCollector, DirectoryProvider, FactError, JwtIssuerConfig,
    KeySetSource, RemoteJwk, RemoteKeySet, TrustDomain, UpstreamVerifier,
};
use passport_broker::{ExchangeSettings, TokenExchangeService};
use passport_core::{EmptyPassportPolicy, KeyDefinition, KeyRegistry, RsaComponents};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const UPSTREAM_ISSUER: &str = "https://login.example.org";
pub const BROKER_ISSUER: &str = "https://broker.example.org";
pub const DAC_DOMAIN: &str = "https://dac.example.org";
pub const DIRECTORY_DOMAIN: &str = "https://directory.example.org";
pub const STUDY_1: &str = "urn:fdc:example:study/1";

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn rsa_components() -> RsaComponents {
    serde_json::from_value(json!({
        "n": "uigDVOKw4j8k-VDPc-Ronr9hWjtzk40OYUaQD6CLl6zJONTz3ZuM8LxIdve8GwgJuhLlr1uR_25NBpFLBhluDJwfNmgyV3rHUzJjXsJIBkKVr0VOYW5n1vyKy4kNR31m6ePrh7Y5xj0YUTdJqq76KzmMFW8jLw2sEv7-BgK0b5sORKEd7hPKIroI-c1aQfMzfR04eeqs-AlrjcZ9psFdvg0W2Ml4wRyrdxerA7vWLmGAoq1LpRqXpl7h-Vmq-7-bVt9MfOUbUAaQ4snmbneDOiwj8fuJa8aJwFyvxu4G6pXAdKRbLG43Rsj_bsOqsSoJQIev1WEcSKpbhweybWvyYw",
        "e": "AQAB",
        "d": "Q6lcgKN-sFVMLpRZOuHnxt9_1oiqWxSXh_LaVNvBMSl73_zDAKbTpQKCgj9MLzUOOAQ7WK_7UnC4bW0s7DQdBFdQnvljZtl5DnvPk3chL6lO96xEr3QuKP2UwyL24Seq2tNdXe_1cuDs8EQcsf20bzaU_ItvKeCZzTPCh9O-2ptNj1J6oKGD-fRZF2ImOwKWZaBeXQZa007KVQjzd72jO16SoMETHqmwS7p1TF8pwzJMUwE-jpEb0-dySLrIz1rBlL8KBHe-1LsvXIeeFSi76Hl1vbSz17HlQfji2mgGPTWJ0v1oF2KE1AhMVVDVWLlVgBj7eF2tEfYnVZGSsNR5KQ",
        "p": "6j2YOM0_-I-Wz3D60Ls_kMU7ayzjUxcXQSbPTmz8K_cDsHXhEpA7LM-svEkzO4Xa9mt8DXZi5pcD4Ib1Zu5NzylpYInwkFxR3MMoGE4AvyS1eHx0dk6WlIHfTQp_4tpAW0G6zs4VEyyC9cYJsCADgnQeFm9n1OlM_3C48x2vQUk",
        "q": "y3LwpnYF6NOJKPRkctkjjQzJRZ1-sBm6CwXQib730ZYCw4AouhtQRpZoY_xyFm78Nua3vdPCFc16gNMF4oWGowQw0LoJO6ZX1P8YeQzboFIgbYLnJxloPaM7Je0Wu8yAKE5JtOXcpRwPxZ-qOMwRuSYtaN8mhkjEQQ5Rc-lHQks",
        "dp": "DG8-oG1M4w4ETHjL57647h96OwNEAgoswtmjkZ85d8ACIyDu1MRxT7yqh8g-_v7pE8G68SACugj0PLwNVOx7lu602FoaOh-cfOKjQz8IzRzOwVmh-RHM7o9CYl2XUlyRpAaGOyo3djAbt55Or1nTtd4iJsC9O1EzNDAwsT83KXk",
        "dq": "o_vJLOMEcF3QuEoEjO2oUhB0SsBfVOHnqurM47ohVbVsFNg_-4H4emzRR4Y7Dwn2EOp2P3NnhNtSWnO80pB9rPe7wQGyX3n8YZobx7YtcFPB_4L7ffBkrQncqv0mzchPpC02C7Ea35p2u_ut4Inb3zh-cYEsNCCCz00TKjJlVXE",
        "qi": "E5ZP9lkpcvStp5HUAdap4s1qoATtCh9D6S7MT5UkmLZKV6iFmScrrTfAEWWAL2vRlXyfb0rGtMqfd0ZlZC94cq1dgKzmRKnIZOE-ZYjRq_3JplGKUqx3Qkmy7KGPDvGUTYDc1HILp6gIaHynTJ0-rsfQ1fQPXaKaTIS0ZxbldZ0",
    }))
    .unwrap()
}

pub fn registry() -> Arc<KeyRegistry> {
    Arc::new(
        KeyRegistry::new(vec![
            KeyDefinition::ed25519("visa-key", [7u8; 32]),
            KeyDefinition::rsa("passport-key", rsa_components()),
        ])
        .unwrap(),
    )
}

pub fn passport_decoding_key() -> DecodingKey {
    let c = rsa_components();
    DecodingKey::from_rsa_components(&c.n, &c.e).unwrap()
}

// =============================================================================
// Upstream identity provider
// =============================================================================

pub fn upstream_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// EdDSA-signed upstream access token
pub fn upstream_token(sub: &str, exp_offset: i64) -> String {
    let now = now();
    sign_upstream(json!({
        "iss": UPSTREAM_ISSUER,
        "sub": sub,
        "iat": now,
        "exp": now + exp_offset,
    }))
}

pub fn sign_upstream(claims: serde_json::Value) -> String {
    let header = json!({"alg": "EdDSA", "typ": "JWT", "kid": "upstream-1"});
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let signature = upstream_key().sign(signing_input.as_bytes());
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Upstream JWKS, counting fetches
#[derive(Default)]
pub struct CountingKeySource {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl KeySetSource for CountingKeySource {
    async fn fetch(&self, _issuer: &str, _jwks_url: &str) -> passport_bridge::Result<RemoteKeySet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteKeySet {
            keys: vec![RemoteJwk {
                kid: Some("upstream-1".into()),
                kty: "OKP".into(),
                alg: Some("EdDSA".into()),
                key_use: Some("sig".into()),
                crv: Some("Ed25519".into()),
                x: Some(URL_SAFE_NO_PAD.encode(upstream_key().verifying_key().as_bytes())),
                ..Default::default()
            }],
        })
    }
}

// =============================================================================
// Fact providers
// =============================================================================

/// subject -> datasets, counting calls
#[derive(Default)]
pub struct CountingAccess {
    pub grants: HashMap<String, Vec<String>>,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingAccess {
    pub fn with_grant(mut self, subject: &str, dataset: &str) -> Self {
        self.grants
            .entry(subject.to_string())
            .or_default()
            .push(dataset.to_string());
        self
    }
}

#[async_trait]
impl ApprovedAccessProvider for CountingAccess {
    async fn approved_datasets(&self, subject: &str) -> Result<Vec<String>, FactError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FactError::unavailable("approved-access", "503 Service Unavailable"));
        }
        Ok(self.grants.get(subject).cloned().unwrap_or_default())
    }
}

/// group members, counting calls
#[derive(Default)]
pub struct CountingDirectory {
    pub members: HashSet<(String, String)>,
    pub calls: AtomicUsize,
}

impl CountingDirectory {
    pub fn with_member(mut self, group: &str, subject: &str) -> Self {
        self.members.insert((group.to_string(), subject.to_string()));
        self
    }
}

#[async_trait]
impl DirectoryProvider for CountingDirectory {
    async fn is_member(&self, subject: &str, group: &str) -> Result<bool, FactError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .members
            .contains(&(group.to_string(), subject.to_string())))
    }
}

// =============================================================================
// Service wiring
// =============================================================================

pub struct Harness {
    pub service: TokenExchangeService,
    pub keys: Arc<CountingKeySource>,
    pub access: Arc<CountingAccess>,
    pub directory: Arc<CountingDirectory>,
}

impl Harness {
    pub fn key_fetches(&self) -> usize {
        self.keys.fetches.load(Ordering::SeqCst)
    }

    pub fn access_calls(&self) -> usize {
        self.access.calls.load(Ordering::SeqCst)
    }

    pub fn directory_calls(&self) -> usize {
        self.directory.calls.load(Ordering::SeqCst)
    }
}

pub fn settings(trust_domains: Vec<TrustDomain>, policy: EmptyPassportPolicy) -> ExchangeSettings {
    ExchangeSettings {
        issuer: BROKER_ISSUER.into(),
        passport_kid: "passport-key".into(),
        passport_ttl: Duration::from_secs(3600),
        upstream_issuer: UPSTREAM_ISSUER.into(),
        trust_domains,
        subject_aliases: HashMap::new(),
        empty_passport: policy,
    }
}

/// One trust domain fed by both providers
pub fn dac_domain() -> TrustDomain {
    TrustDomain::new(DAC_DOMAIN, "visa-key").with_trusted_researcher_group("researchers")
}

pub fn harness(
    access: CountingAccess,
    directory: CountingDirectory,
    settings: ExchangeSettings,
) -> Harness {
    let keys = Arc::new(CountingKeySource::default());
    let access = Arc::new(access);
    let directory = Arc::new(directory);

    let verifier = UpstreamVerifier::new(keys.clone(), Duration::from_secs(300))
        .with_issuer(JwtIssuerConfig::new(UPSTREAM_ISSUER, "https://login.example.org/jwks"));
    let collector = AssertionCollector::new(access.clone(), directory.clone())
        .with_call_timeout(Duration::from_secs(2));

    Harness {
        service: TokenExchangeService::new(registry(), verifier, collector, settings),
        keys,
        access,
        directory,
    }
}
