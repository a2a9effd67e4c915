//! Business-fact providers
//!
//! The broker never decides who may access what; it asks external
//! collaborators. Each collaborator sits behind one of these traits.

use async_trait::async_trait;

use crate::error::FactError;

pub mod fixed;
pub mod http;

pub use fixed::{StaticApprovedAccess, StaticDirectory};
pub use http::{HttpApprovedAccess, HttpDirectory};

/// Which controlled datasets a subject has been approved to access
#[async_trait]
pub trait ApprovedAccessProvider: Send + Sync {
    async fn approved_datasets(&self, subject: &str) -> Result<Vec<String>, FactError>;

    /// Get a description of this provider (for logging)
    fn description(&self) -> &str {
        "approved-access provider"
    }
}

/// Directory group membership
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn is_member(&self, subject: &str, group: &str) -> Result<bool, FactError>;

    /// Get a description of this provider (for logging)
    fn description(&self) -> &str {
        "directory provider"
    }
}
