//! In-memory providers for development and tests

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::{ApprovedAccessProvider, DirectoryProvider};
use crate::error::FactError;

/// Fixed subject -> datasets table
#[derive(Debug, Clone, Default)]
pub struct StaticApprovedAccess {
    grants: HashMap<String, BTreeSet<String>>,
}

impl StaticApprovedAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, subject: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        self.grants
            .entry(subject.into())
            .or_default()
            .insert(dataset_id.into());
        self
    }
}

#[async_trait]
impl ApprovedAccessProvider for StaticApprovedAccess {
    async fn approved_datasets(&self, subject: &str) -> Result<Vec<String>, FactError> {
        Ok(self
            .grants
            .get(subject)
            .map(|datasets| datasets.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn description(&self) -> &str {
        "static approved-access table"
    }
}

/// Fixed group -> members table
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    groups: HashMap<String, HashSet<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, group: impl Into<String>, subject: impl Into<String>) -> Self {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(subject.into());
        self
    }
}

#[async_trait]
impl DirectoryProvider for StaticDirectory {
    async fn is_member(&self, subject: &str, group: &str) -> Result<bool, FactError> {
        Ok(self
            .groups
            .get(group)
            .is_some_and(|members| members.contains(subject)))
    }

    fn description(&self) -> &str {
        "static directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_approved_access() {
        let provider = StaticApprovedAccess::new()
            .with_grant("alice", "urn:fdc:example:study/2")
            .with_grant("alice", "urn:fdc:example:study/1")
            .with_grant("alice", "urn:fdc:example:study/1");

        assert_eq!(
            provider.approved_datasets("alice").await.unwrap(),
            vec!["urn:fdc:example:study/1", "urn:fdc:example:study/2"]
        );
        assert!(provider.approved_datasets("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticDirectory::new().with_member("researchers", "alice");

        assert!(directory.is_member("alice", "researchers").await.unwrap());
        assert!(!directory.is_member("bob", "researchers").await.unwrap());
        assert!(!directory.is_member("alice", "admins").await.unwrap());
    }
}
