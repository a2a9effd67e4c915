//! Core types for the passport bridge

use serde::{Deserialize, Serialize};

/// Identity extracted from a verified upstream token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedSubject {
    /// The `sub` claim
    pub subject: String,

    /// Every claim of the token, as issued
    pub raw_claims: serde_json::Map<String, serde_json::Value>,
}

impl VerifiedSubject {
    /// Replace the subject, keeping the claims the upstream issued
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Look up a string claim
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.raw_claims.get(name).and_then(|v| v.as_str())
    }
}

/// A trust domain: one issuer key under which a visa list is grouped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDomain {
    /// Key of this domain in the passport's `ga4gh.iss` map
    pub issuer: String,

    /// Ed25519 key id that signs this domain's visas
    pub kid: String,

    /// Query the approved-access provider for `c:` tokens
    #[serde(default = "default_approved_access")]
    pub approved_access: bool,

    /// Directory group whose members get `r:trusted_researcher`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_researcher_group: Option<String>,

    /// Visa validity window (seconds), written as the `et:` token
    #[serde(default = "default_visa_ttl")]
    pub visa_ttl_secs: u64,
}

fn default_approved_access() -> bool {
    true
}

fn default_visa_ttl() -> u64 {
    3600
}

impl TrustDomain {
    pub fn new(issuer: impl Into<String>, kid: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            kid: kid.into(),
            approved_access: default_approved_access(),
            trusted_researcher_group: None,
            visa_ttl_secs: default_visa_ttl(),
        }
    }

    pub fn with_approved_access(mut self, enabled: bool) -> Self {
        self.approved_access = enabled;
        self
    }

    pub fn with_trusted_researcher_group(mut self, group: impl Into<String>) -> Self {
        self.trusted_researcher_group = Some(group.into());
        self
    }

    pub fn with_visa_ttl(mut self, secs: u64) -> Self {
        self.visa_ttl_secs = secs;
        self
    }
}
