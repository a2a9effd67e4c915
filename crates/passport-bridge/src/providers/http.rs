//! HTTP adapters for the fact-provider traits
//!
//! - approved access: `GET {base}/subjects/{subject}/datasets` -> `["<datasetId>", ...]`
//! - directory: `GET {base}/groups/{group}/members/{subject}` -> `{"member": bool}`,
//!   404 meaning "not a member"

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{ApprovedAccessProvider, DirectoryProvider};
use crate::error::FactError;

/// Append percent-encoded path segments to a base URL
fn endpoint(provider: &str, base: &Url, segments: &[&str]) -> Result<Url, FactError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FactError::unavailable(provider, format!("'{}' cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_base(provider: &str, base_url: &str) -> Result<Url, FactError> {
    Url::parse(base_url).map_err(|e| FactError::unavailable(provider, e))
}

/// Approved-access query served by the business application
pub struct HttpApprovedAccess {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApprovedAccess {
    const NAME: &'static str = "approved-access";

    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, FactError> {
        Ok(Self {
            client,
            base_url: parse_base(Self::NAME, base_url)?,
        })
    }
}

#[async_trait]
impl ApprovedAccessProvider for HttpApprovedAccess {
    async fn approved_datasets(&self, subject: &str) -> Result<Vec<String>, FactError> {
        let url = endpoint(Self::NAME, &self.base_url, &["subjects", subject, "datasets"])?;
        debug!(url = %url, "Querying approved datasets");

        let datasets = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FactError::unavailable(Self::NAME, e))?
            .json::<Vec<String>>()
            .await
            .map_err(|e| FactError::unavailable(Self::NAME, e))?;
        Ok(datasets)
    }

    fn description(&self) -> &str {
        "HTTP approved-access query"
    }
}

#[derive(Debug, Deserialize)]
struct MembershipResponse {
    member: bool,
}

/// Directory group-membership lookup
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDirectory {
    const NAME: &'static str = "directory";

    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, FactError> {
        Ok(Self {
            client,
            base_url: parse_base(Self::NAME, base_url)?,
        })
    }
}

#[async_trait]
impl DirectoryProvider for HttpDirectory {
    async fn is_member(&self, subject: &str, group: &str) -> Result<bool, FactError> {
        let url = endpoint(Self::NAME, &self.base_url, &["groups", group, "members", subject])?;
        debug!(url = %url, "Querying group membership");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FactError::unavailable(Self::NAME, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body = response
            .error_for_status()
            .map_err(|e| FactError::unavailable(Self::NAME, e))?
            .json::<MembershipResponse>()
            .await
            .map_err(|e| FactError::unavailable(Self::NAME, e))?;
        Ok(body.member)
    }

    fn description(&self) -> &str {
        "HTTP directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("https://dac.example.org/api/").unwrap();
        let url = endpoint("test", &base, &["subjects", "alice smith/1", "datasets"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dac.example.org/api/subjects/alice%20smith%2F1/datasets"
        );
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let base = Url::parse("https://directory.example.org").unwrap();
        let url = endpoint("test", &base, &["groups", "researchers", "members", "alice"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://directory.example.org/groups/researchers/members/alice"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpApprovedAccess::new(reqwest::Client::new(), "not a url");
        assert!(matches!(
            result,
            Err(FactError::FactProviderUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_directory_fails_closed() {
        let directory =
            HttpDirectory::new(reqwest::Client::new(), "http://127.0.0.1:1/").unwrap();
        let result = directory.is_member("alice", "researchers").await;
        assert!(matches!(
            result,
            Err(FactError::FactProviderUnavailable { .. })
        ));
    }
}
