//! Broker configuration
//!
//! Process-level settings come from the environment (`BROKER_PORT`,
//! `BROKER_LOG_LEVEL`, `BROKER_CONFIG_PATH`, `BROKER_KEYS_PATH`); everything
//! describing the exchange itself lives in a JSON document.

use passport_bridge::{
    providers::{HttpApprovedAccess, HttpDirectory, StaticApprovedAccess, StaticDirectory},
    ApprovedAccessProvider, AssertionCollector, DirectoryProvider, FactError, HttpKeySetSource,
    JwtIssuerConfig, TrustDomain, UpstreamVerifier,
};
use passport_core::{EmptyPassportPolicy, KeyRegistry, PassportError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::exchange::{ExchangeSettings, TokenExchangeService};

/// Start-up failures. Any of these stops the broker.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid key material: {0}")]
    Keys(#[from] PassportError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid fact provider: {0}")]
    Provider(#[from] FactError),

    #[error("Failed to build HTTP client: {0}")]
    Http(String),
}

/// Upstream identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(flatten)]
    pub issuer: JwtIssuerConfig,

    /// How long a fetched key set is trusted (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Timeout per key-set fetch attempt (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Key-set fetch attempts before giving up
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Minimum age of a cached key set before an unknown `kid` refetches it
    /// (seconds)
    #[serde(default = "default_key_refresh_interval")]
    pub key_refresh_interval_secs: u64,
}

/// Where business facts come from
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEndpoints {
    /// Base URL of the approved-access query
    #[serde(default)]
    pub approved_access_url: Option<String>,

    /// Base URL of the directory service
    #[serde(default)]
    pub directory_url: Option<String>,

    /// Timeout per provider call (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            approved_access_url: None,
            directory_url: None,
            call_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Broker configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// `iss` of issued passports
    pub issuer: String,

    /// RSA key id that signs passports
    pub passport_kid: String,

    /// Passport lifetime (seconds)
    #[serde(default = "default_passport_ttl")]
    pub passport_ttl_secs: u64,

    pub upstream: UpstreamConfig,

    pub trust_domains: Vec<TrustDomain>,

    /// Legacy subject identifier -> canonical identifier
    #[serde(default)]
    pub subject_aliases: HashMap<String, String>,

    #[serde(default)]
    pub empty_passport: EmptyPassportPolicy,

    #[serde(default)]
    pub providers: ProviderEndpoints,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_passport_ttl() -> u64 {
    3600
}

fn default_key_refresh_interval() -> u64 {
    30
}

/// Upper bound on passport and visa lifetimes (one year)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

fn check_ttl(name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
        return Err(ConfigError::Invalid(format!(
            "{} must be between 1 and {} seconds",
            name, MAX_TOKEN_TTL_SECS
        )));
    }
    Ok(())
}

fn check_timeout(name: &str, millis: u64) -> Result<(), ConfigError> {
    if millis == 0 {
        return Err(ConfigError::Invalid(format!("{} must be positive", name)));
    }
    Ok(())
}

impl BrokerConfig {
    /// Parse a configuration document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Check the configuration against the loaded keys
    pub fn validate(&self, registry: &KeyRegistry) -> Result<(), ConfigError> {
        if self.trust_domains.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one trust domain is required".into(),
            ));
        }
        check_ttl("passport_ttl_secs", self.passport_ttl_secs)?;
        for domain in &self.trust_domains {
            check_ttl("visa_ttl_secs", domain.visa_ttl_secs)?;
        }
        check_timeout("upstream.fetch_timeout_ms", self.upstream.fetch_timeout_ms)?;
        check_timeout("providers.call_timeout_ms", self.providers.call_timeout_ms)?;

        expect_kind(registry, &self.passport_kid, "RSA")?;
        for domain in &self.trust_domains {
            expect_kind(registry, &domain.kid, "Ed25519")?;
        }
        Ok(())
    }

    pub fn exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            issuer: self.issuer.clone(),
            passport_kid: self.passport_kid.clone(),
            passport_ttl: Duration::from_secs(self.passport_ttl_secs),
            upstream_issuer: self.upstream.issuer.issuer.clone(),
            trust_domains: self.trust_domains.clone(),
            subject_aliases: self.subject_aliases.clone(),
            empty_passport: self.empty_passport,
        }
    }

    /// Build the exchange service with HTTP-backed collaborators
    pub fn build_service(&self, registry: Arc<KeyRegistry>) -> Result<TokenExchangeService, ConfigError> {
        self.validate(&registry)?;

        let client = reqwest_client()?;

        let source = HttpKeySetSource::new(client.clone())
            .with_attempt_timeout(Duration::from_millis(self.upstream.fetch_timeout_ms))
            .with_max_attempts(self.upstream.fetch_attempts);
        let verifier = UpstreamVerifier::new(
            Arc::new(source),
            Duration::from_secs(self.upstream.cache_ttl_secs),
        )
        .with_min_refresh_interval(Duration::from_secs(self.upstream.key_refresh_interval_secs))
        .with_issuer(self.upstream.issuer.clone());

        let access: Arc<dyn ApprovedAccessProvider> = match &self.providers.approved_access_url {
            Some(url) => Arc::new(HttpApprovedAccess::new(client.clone(), url)?),
            None => {
                warn!("No approved-access URL configured, no datasets will be granted");
                Arc::new(StaticApprovedAccess::new())
            }
        };
        let directory: Arc<dyn DirectoryProvider> = match &self.providers.directory_url {
            Some(url) => Arc::new(HttpDirectory::new(client, url)?),
            None => {
                warn!("No directory URL configured, no roles will be granted");
                Arc::new(StaticDirectory::new())
            }
        };
        let collector = AssertionCollector::new(access, directory)
            .with_call_timeout(Duration::from_millis(self.providers.call_timeout_ms));

        info!(
            issuer = %self.issuer,
            upstream = %self.upstream.issuer.issuer,
            trust_domains = self.trust_domains.len(),
            empty_passport = ?self.empty_passport,
            "Exchange service configured"
        );

        Ok(TokenExchangeService::new(
            registry,
            verifier,
            collector,
            self.exchange_settings(),
        ))
    }
}

fn expect_kind(registry: &KeyRegistry, kid: &str, expected: &'static str) -> Result<(), ConfigError> {
    let definition = registry.lookup(kid)?;
    let actual = definition.kind.name();
    if actual != expected {
        return Err(PassportError::WrongKeyKind {
            kid: kid.to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn reqwest_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(concat!("passport-broker/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Http(e.to_string()))
}
