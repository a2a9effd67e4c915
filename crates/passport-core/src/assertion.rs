//! Assertion tokens and visa content strings
//!
//! A visa's signed content is a set of short `<tag>:<value>` tokens, sorted
//! lexicographically and joined by a single space:
//!
//! ```text
//! c:urn:fdc:example:study/1 et:1767225600 iu:alice iv:5f0c...
//! ```
//!
//! Fact tokens (`c`, `r`) come from business facts; bookkeeping tokens
//! (`et`, `iu`, `iv`) are added for every visa.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PassportError, Result};

/// Role tag granted to members of the trusted-researcher directory group
pub const TRUSTED_RESEARCHER: &str = "trusted_researcher";

/// Token tags
pub mod tag {
    pub const CONTROLLED_ACCESS: &str = "c";
    pub const ROLE: &str = "r";
    pub const EXPIRY: &str = "et";
    pub const SUBJECT: &str = "iu";
    pub const VISA_ID: &str = "iv";
}

/// Business fact that becomes an assertion token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertionFact {
    /// Subject is approved to access a controlled dataset
    ControlledAccessGrant { dataset_id: String },
    /// Subject holds a trusted role
    TrustedRole { role_tag: String },
}

impl AssertionFact {
    pub fn dataset(dataset_id: impl Into<String>) -> Self {
        AssertionFact::ControlledAccessGrant {
            dataset_id: dataset_id.into(),
        }
    }

    pub fn role(role_tag: impl Into<String>) -> Self {
        AssertionFact::TrustedRole {
            role_tag: role_tag.into(),
        }
    }

    /// Convert into its assertion token
    pub fn to_token(&self) -> Result<AssertionToken> {
        match self {
            AssertionFact::ControlledAccessGrant { dataset_id } => {
                AssertionToken::new(tag::CONTROLLED_ACCESS, dataset_id)
            }
            AssertionFact::TrustedRole { role_tag } => AssertionToken::new(tag::ROLE, role_tag),
        }
    }
}

/// A single `<tag>:<value>` token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssertionToken(String);

impl AssertionToken {
    /// Build a token. The value must be non-empty and free of whitespace,
    /// otherwise the joined content string would be ambiguous.
    pub fn new(tag: &str, value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        if tag.is_empty() || tag.contains(':') || tag.chars().any(char::is_whitespace) {
            return Err(PassportError::InvalidAssertion(format!("bad tag '{}'", tag)));
        }
        if value.is_empty() {
            return Err(PassportError::InvalidAssertion(format!(
                "empty value for tag '{}'",
                tag
            )));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(PassportError::InvalidAssertion(format!(
                "whitespace in value for tag '{}'",
                tag
            )));
        }
        Ok(Self(format!("{}:{}", tag, value)))
    }

    /// Parse a token from its wire form
    pub fn parse(token: &str) -> Result<Self> {
        let (tag, value) = token
            .split_once(':')
            .ok_or_else(|| PassportError::InvalidAssertion(format!("missing tag in '{}'", token)))?;
        Self::new(tag, value)
    }

    pub fn tag(&self) -> &str {
        self.0.split_once(':').map(|(t, _)| t).unwrap_or_default()
    }

    pub fn value(&self) -> &str {
        self.0.split_once(':').map(|(_, v)| v).unwrap_or_default()
    }

    /// Bookkeeping tokens are added to every visa regardless of facts
    pub fn is_bookkeeping(&self) -> bool {
        matches!(self.tag(), tag::EXPIRY | tag::SUBJECT | tag::VISA_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssertionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the canonical content string for one visa
///
/// Deterministic: the same facts with the same `expiry` and `jti` always
/// produce the same string, whatever order the facts arrive in. Duplicate
/// facts are collapsed.
pub fn build_content(
    facts: &[AssertionFact],
    subject: &str,
    expiry: i64,
    jti: &str,
) -> Result<String> {
    let mut tokens = facts
        .iter()
        .map(AssertionFact::to_token)
        .collect::<Result<Vec<_>>>()?;
    tokens.push(AssertionToken::new(tag::EXPIRY, expiry.to_string())?);
    tokens.push(AssertionToken::new(tag::SUBJECT, subject)?);
    tokens.push(AssertionToken::new(tag::VISA_ID, jti)?);

    tokens.sort();
    tokens.dedup();

    Ok(tokens
        .iter()
        .map(AssertionToken::as_str)
        .collect::<Vec<_>>()
        .join(" "))
}

/// Split a content string back into tokens
pub fn parse_content(content: &str) -> Result<Vec<AssertionToken>> {
    if content.is_empty() {
        return Ok(Vec::new());
    }
    content.split(' ').map(AssertionToken::parse).collect()
}
