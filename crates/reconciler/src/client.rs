//! Collaborator interfaces the reconciler depends on.
//!
//! Production implementations live in [`crate::kube_client`]; tests use
//! `memory::InMemoryCluster` from the `test-util` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::certificate::Certificate;
use crate::claim::IdentityClaim;
use crate::error::Result;
use kube::core::Selector;
use crate::types::{ClaimKey, UpsertOutcome};

/// Read and write access to claim records.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Fetch a claim; `None` if it no longer exists.
    async fn get(&self, key: &ClaimKey) -> Result<Option<IdentityClaim>>;

    /// Persist metadata changes (finalizers). Fails with
    /// [`crate::Error::Conflict`] if the record changed since it was read.
    async fn update(&self, claim: &IdentityClaim) -> Result<IdentityClaim>;

    /// Replace the status subresource. Same concurrency rules as
    /// [`ClaimStore::update`].
    async fn update_status(&self, claim: &IdentityClaim) -> Result<IdentityClaim>;
}

/// Counts workloads matching a compiled selector.
#[async_trait]
pub trait WorkloadQuery: Send + Sync {
    async fn count(&self, namespace: &str, selector: &Selector) -> Result<usize>;
}

/// Manages cert-manager `Certificate` objects.
#[async_trait]
pub trait CertificateClient: Send + Sync {
    /// Create the certificate or overwrite the spec, labels and owner
    /// references of the existing one.
    async fn create_or_update(&self, desired: &Certificate) -> Result<UpsertOutcome>;

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Certificate>>;

    /// Delete a certificate. Missing objects surface as
    /// [`crate::Error::NotFound`].
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
