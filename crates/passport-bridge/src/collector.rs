//! Assertion collection
//!
//! Turns the business facts known about a subject into the content string
//! of one visa per trust domain.

use chrono::Utc;
use passport_core::assertion::{build_content, AssertionFact, TRUSTED_RESEARCHER};
use passport_core::expiry_after;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FactError;
use crate::providers::{ApprovedAccessProvider, DirectoryProvider};
use crate::types::TrustDomain;

/// Content gathered for one trust domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionSet {
    /// Canonical, ready-to-sign content string
    pub content: String,
    /// Visa identifier (`iv:` token)
    pub jti: String,
    /// Visa expiry (`et:` token), unix seconds
    pub expires_at: i64,
    facts: usize,
}

impl AssertionSet {
    /// Whether any `c:`/`r:` token was found
    pub fn has_facts(&self) -> bool {
        self.facts > 0
    }

    pub fn fact_count(&self) -> usize {
        self.facts
    }
}

/// Queries fact providers and builds visa content
pub struct AssertionCollector {
    access: Arc<dyn ApprovedAccessProvider>,
    directory: Arc<dyn DirectoryProvider>,
    call_timeout: Duration,
}

impl AssertionCollector {
    pub fn new(
        access: Arc<dyn ApprovedAccessProvider>,
        directory: Arc<dyn DirectoryProvider>,
    ) -> Self {
        Self {
            access,
            directory,
            call_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run one provider call under the configured timeout
    async fn bounded<T>(
        &self,
        provider: &str,
        call: impl Future<Output = Result<T, FactError>>,
    ) -> Result<T, FactError> {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FactError::unavailable(
                provider,
                format!("no answer within {}ms", self.call_timeout.as_millis()),
            )),
        };
        if let Err(e) = &result {
            warn!(provider = %provider, error = %e, "Fact provider failed");
        }
        result
    }

    async fn facts(&self, subject: &str, domain: &TrustDomain) -> Result<Vec<AssertionFact>, FactError> {
        let mut facts = Vec::new();

        if domain.approved_access {
            let datasets = self
                .bounded(
                    self.access.description(),
                    self.access.approved_datasets(subject),
                )
                .await?;
            facts.extend(datasets.into_iter().map(AssertionFact::dataset));
        }

        if let Some(group) = &domain.trusted_researcher_group {
            let member = self
                .bounded(
                    self.directory.description(),
                    self.directory.is_member(subject, group),
                )
                .await?;
            if member {
                facts.push(AssertionFact::role(TRUSTED_RESEARCHER));
            }
        }

        let mut seen = HashSet::new();
        facts.retain(|f| seen.insert(f.clone()));
        Ok(facts)
    }

    /// Collect the assertion set for `subject` under `domain`
    ///
    /// Every call mints a fresh visa identifier. Any provider failure fails
    /// the whole set.
    pub async fn collect(&self, subject: &str, domain: &TrustDomain) -> Result<AssertionSet, FactError> {
        let facts = self.facts(subject, domain).await?;

        let jti = Uuid::new_v4().to_string();
        let expires_at = expiry_after(Utc::now().timestamp(), domain.visa_ttl_secs)?;
        let content = build_content(&facts, subject, expires_at, &jti)?;

        debug!(
            trust_domain = %domain.issuer,
            facts = facts.len(),
            jti = %jti,
            "Collected assertions"
        );
        Ok(AssertionSet {
            content,
            jti,
            expires_at,
            facts: facts.len(),
        })
    }
}
