//! Passport Bridge
//!
//! The bridge connects the broker to the outside world:
//!
//! - **Verifier**: checks upstream identity tokens against the issuer's
//!   remote JWKS, cached per issuer with single-flight refresh
//! - **Providers**: approved-access and directory lookups behind traits,
//!   with HTTP and in-memory adapters
//! - **Collector**: turns a subject's facts into visa content for one
//!   trust domain
//!
//! ## Usage
//!
//! ```ignore
//! use passport_bridge::{providers::*, *};
//!
//! let verifier = UpstreamVerifier::new(Arc::new(HttpKeySetSource::default()), ttl)
//!     .with_issuer(JwtIssuerConfig::new(
//!         "https://login.example.org",
//!         "https://login.example.org/jwks",
//!     ));
//! let subject = verifier.verify(bearer, "https://login.example.org").await?;
//!
//! let collector = AssertionCollector::new(Arc::new(access), Arc::new(directory));
//! let set = collector.collect(&subject.subject, &domain).await?;
//! ```

pub mod collector;
pub mod error;
pub mod providers;
pub mod types;
pub mod verifier;

pub use collector::{AssertionCollector, AssertionSet};
pub use error::{FactError, Result, VerifierError};
pub use providers::{ApprovedAccessProvider, DirectoryProvider};
pub use types::{TrustDomain, VerifiedSubject};
pub use verifier::{HttpKeySetSource, JwtIssuerConfig, KeySetSource, RemoteJwk, RemoteKeySet, UpstreamVerifier};
