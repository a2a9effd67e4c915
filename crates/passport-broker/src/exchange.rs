//! RFC 8693 token exchange: upstream access token in, passport out
//!
//! ```text
//! Received -> ParamsValidated -> SubjectVerified -> AssertionsCollected
//!          -> PassportAssembled -> Responded
//! ```
//!
//! Any step may fail; the returned [`ExchangeError`] reports the state the
//! exchange was in when it stopped. Nothing is signed unless every earlier
//! step succeeded.

use passport_bridge::{AssertionCollector, FactError, TrustDomain, UpstreamVerifier, VerifierError};
use passport_core::{
    EmptyPassportPolicy, KeyRegistry, PassportAssembler, PassportError, VisaSigner,
    VisasByTrustDomain,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// `grant_type` for token exchange
pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// `subject_token_type` accepted from callers
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// `requested_token_type` / `issued_token_type` of a passport
pub const COMPACT_PASSPORT_TYPE: &str = "urn:ga4gh:params:oauth:token-type:compact-passport";

/// Where an exchange is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Received,
    ParamsValidated,
    SubjectVerified,
    AssertionsCollected,
    PassportAssembled,
    Responded,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Received => "received",
            ExchangeState::ParamsValidated => "params_validated",
            ExchangeState::SubjectVerified => "subject_verified",
            ExchangeState::AssertionsCollected => "assertions_collected",
            ExchangeState::PassportAssembled => "passport_assembled",
            ExchangeState::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Token exchange request (RFC 8693 §2.1)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub grant_type: String,

    /// Upstream access token
    #[serde(default)]
    pub subject_token: String,

    #[serde(default)]
    pub subject_token_type: String,

    #[serde(default)]
    pub requested_token_type: String,
}

impl ExchangeRequest {
    /// A well-formed passport request for `subject_token`
    pub fn passport(subject_token: impl Into<String>) -> Self {
        Self {
            grant_type: TOKEN_EXCHANGE_GRANT.into(),
            subject_token: subject_token.into(),
            subject_token_type: ACCESS_TOKEN_TYPE.into(),
            requested_token_type: COMPACT_PASSPORT_TYPE.into(),
        }
    }
}

/// Token exchange response (RFC 8693 §2.2.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// The signed passport
    pub access_token: String,

    pub issued_token_type: String,

    /// Always "Bearer"
    pub token_type: String,

    /// Passport lifetime (seconds)
    pub expires_in: u64,
}

/// Why an exchange stopped
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid {parameter}: {reason}")]
    InvalidGrantParameters {
        parameter: &'static str,
        reason: String,
    },

    #[error("Subject token rejected: {0}")]
    Verification(#[from] VerifierError),

    #[error("Assertion collection failed: {0}")]
    Collection(#[from] FactError),

    #[error("Visa signing failed: {0}")]
    VisaSigning(#[source] PassportError),

    #[error("Passport assembly failed: {0}")]
    Assembly(#[source] PassportError),
}

impl ExchangeError {
    /// The state the exchange was in when it failed
    pub fn state(&self) -> ExchangeState {
        match self {
            ExchangeError::InvalidGrantParameters { .. } => ExchangeState::Received,
            ExchangeError::Verification(_) => ExchangeState::ParamsValidated,
            ExchangeError::Collection(_) | ExchangeError::VisaSigning(_) => {
                ExchangeState::SubjectVerified
            }
            ExchangeError::Assembly(_) => ExchangeState::AssertionsCollected,
        }
    }

    fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        ExchangeError::InvalidGrantParameters {
            parameter,
            reason: reason.into(),
        }
    }
}

/// What the exchange issues, and for whom
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    /// `iss` of issued passports
    pub issuer: String,
    pub passport_kid: String,
    pub passport_ttl: Duration,
    /// Issuer subject tokens must come from
    pub upstream_issuer: String,
    pub trust_domains: Vec<TrustDomain>,
    pub subject_aliases: HashMap<String, String>,
    pub empty_passport: EmptyPassportPolicy,
}

/// Runs token exchanges
pub struct TokenExchangeService {
    registry: Arc<KeyRegistry>,
    verifier: UpstreamVerifier,
    collector: AssertionCollector,
    settings: ExchangeSettings,
}

impl TokenExchangeService {
    pub fn new(
        registry: Arc<KeyRegistry>,
        verifier: UpstreamVerifier,
        collector: AssertionCollector,
        settings: ExchangeSettings,
    ) -> Self {
        Self {
            registry,
            verifier,
            collector,
            settings,
        }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    fn validate_params(request: &ExchangeRequest) -> Result<(), ExchangeError> {
        if request.grant_type != TOKEN_EXCHANGE_GRANT {
            return Err(ExchangeError::invalid(
                "grant_type",
                format!("unsupported grant '{}'", request.grant_type),
            ));
        }
        if request.subject_token_type != ACCESS_TOKEN_TYPE {
            return Err(ExchangeError::invalid(
                "subject_token_type",
                format!("expected {}", ACCESS_TOKEN_TYPE),
            ));
        }
        if request.requested_token_type != COMPACT_PASSPORT_TYPE {
            return Err(ExchangeError::invalid(
                "requested_token_type",
                format!("expected {}", COMPACT_PASSPORT_TYPE),
            ));
        }
        if request.subject_token.trim().is_empty() {
            return Err(ExchangeError::invalid("subject_token", "missing"));
        }
        Ok(())
    }

    /// Canonical identifier for a verified subject
    fn canonical_subject<'a>(&'a self, subject: &'a str) -> &'a str {
        match self.settings.subject_aliases.get(subject) {
            Some(canonical) => {
                debug!(from = %subject, to = %canonical, "Applied subject alias");
                canonical
            }
            None => subject,
        }
    }

    async fn collect_visas(&self, subject: &str) -> Result<VisasByTrustDomain, ExchangeError> {
        let signer = VisaSigner::new(&self.registry);
        let mut visas = VisasByTrustDomain::new();

        for domain in &self.settings.trust_domains {
            let set = self.collector.collect(subject, domain).await?;
            let list = visas.entry(domain.issuer.clone()).or_default();
            if set.has_facts() {
                let visa = signer
                    .sign(&set.content, &domain.kid)
                    .map_err(ExchangeError::VisaSigning)?;
                list.push(visa);
            } else {
                debug!(trust_domain = %domain.issuer, "No facts, empty visa list");
            }
        }
        Ok(visas)
    }

    async fn run(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, ExchangeError> {
        Self::validate_params(request)?;
        transition(ExchangeState::ParamsValidated);

        let verified = self
            .verifier
            .verify(&request.subject_token, &self.settings.upstream_issuer)
            .await?;
        let subject = self.canonical_subject(&verified.subject);
        transition(ExchangeState::SubjectVerified);

        let visas = self.collect_visas(subject).await?;
        transition(ExchangeState::AssertionsCollected);

        let access_token = PassportAssembler::new(&self.registry, &self.settings.passport_kid)
            .with_policy(self.settings.empty_passport)
            .assemble(
                subject,
                &self.settings.issuer,
                self.settings.passport_ttl,
                visas,
            )
            .map_err(ExchangeError::Assembly)?;
        transition(ExchangeState::PassportAssembled);

        info!(sub = %subject, "Token exchange completed");
        Ok(ExchangeResponse {
            access_token,
            issued_token_type: COMPACT_PASSPORT_TYPE.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.settings.passport_ttl.as_secs(),
        })
    }

    /// Exchange an upstream access token for a passport
    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, ExchangeError> {
        transition(ExchangeState::Received);
        match self.run(request).await {
            Ok(response) => {
                transition(ExchangeState::Responded);
                Ok(response)
            }
            Err(e) => {
                warn!(state = %e.state(), error = %e, "Token exchange failed");
                Err(e)
            }
        }
    }
}

fn transition(state: ExchangeState) {
    debug!(state = %state, "Token exchange transition");
}
