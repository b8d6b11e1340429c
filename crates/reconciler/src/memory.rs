//! In-memory cluster for tests and local simulation (`test-util` feature).
//!
//! [`InMemoryCluster`] implements every collaborator trait with the parts of
//! API-server behavior the reconciler relies on:
//!
//! - writes carry a resource version and fail with a conflict when stale
//! - deleting a claim that carries finalizers only sets its deletion
//!   timestamp; the record is purged once the last finalizer is removed
//! - purging a claim cascades to certificates it controls

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use kube::core::{Selector, SelectorExt};
use tokio::sync::RwLock;
use tracing::debug;

use crate::certificate::{Certificate, CertificateCondition, CertificateStatus};
use crate::claim::{IdentityClaim, IdentityClaimSpec};
use crate::client::{CertificateClient, ClaimStore, Clock, WorkloadQuery};
use crate::error::{Error, Result};
use crate::types::{ClaimKey, UpsertOutcome};

const CLAIM_KIND: &str = "IdentityClaim";
const CERTIFICATE_KIND: &str = "Certificate";

/// Write counters, for asserting idempotence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub claim_updates: usize,
    pub status_updates: usize,
    pub certificate_writes: usize,
    pub certificate_deletes: usize,
}

#[derive(Debug, Clone)]
struct Pod {
    namespace: String,
    name: String,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Faults {
    certificate_writes: Option<String>,
    workload_queries: Option<String>,
    status_conflicts: usize,
}

#[derive(Debug, Default)]
struct ClusterState {
    claims: BTreeMap<ClaimKey, IdentityClaim>,
    certificates: BTreeMap<ClaimKey, Certificate>,
    pods: Vec<Pod>,
    revision: u64,
    uids: u64,
    faults: Faults,
    writes: WriteCounts,
}

impl ClusterState {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn next_uid(&mut self, prefix: &str) -> String {
        self.uids += 1;
        format!("{prefix}-{:08}", self.uids)
    }

    /// Stored claim for a write, checking the caller's resource version.
    fn writable_claim(&mut self, claim: &IdentityClaim) -> Result<&mut IdentityClaim> {
        let key = key_of(claim)?;
        let stored = self
            .claims
            .get_mut(&key)
            .ok_or_else(|| Error::not_found(CLAIM_KIND, key.to_string()))?;

        if stored.resource_version() != claim.resource_version() {
            return Err(Error::conflict(CLAIM_KIND, key.to_string()));
        }
        Ok(stored)
    }

    fn purge_claim(&mut self, key: &ClaimKey) {
        let Some(claim) = self.claims.remove(key) else {
            return;
        };
        let Some(uid) = claim.uid() else {
            return;
        };
        let before = self.certificates.len();
        self.certificates
            .retain(|_, cert| cert.controller_uid() != Some(uid.as_str()));
        debug!(
            claim = %key,
            cascaded = before - self.certificates.len(),
            "purged claim"
        );
    }
}

/// Shared in-memory cluster state.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: RwLock<ClusterState>,
}

impl InMemoryCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cluster behind an `Arc`.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a claim as a user would.
    ///
    /// # Errors
    ///
    /// Fails if the claim has no namespace or already exists.
    pub async fn create_claim(&self, mut claim: IdentityClaim) -> Result<IdentityClaim> {
        let key = key_of(&claim)?;
        let mut state = self.state.write().await;
        if state.claims.contains_key(&key) {
            return Err(Error::store("create", format!("{CLAIM_KIND} '{key}' already exists")));
        }

        claim.metadata.uid = Some(state.next_uid("claim"));
        claim.metadata.generation = Some(1);
        claim.metadata.resource_version = Some(state.next_revision());
        claim.metadata.deletion_timestamp = None;
        claim.status = None;

        state.claims.insert(key, claim.clone());
        Ok(claim)
    }

    /// Replace a claim's spec as a user edit would, bumping its generation.
    ///
    /// # Errors
    ///
    /// Fails if the claim does not exist.
    pub async fn edit_claim_spec(&self, key: &ClaimKey, spec: IdentityClaimSpec) -> Result<()> {
        let mut state = self.state.write().await;
        let revision = state.next_revision();
        let claim = state
            .claims
            .get_mut(key)
            .ok_or_else(|| Error::not_found(CLAIM_KIND, key.to_string()))?;

        claim.spec = spec;
        claim.metadata.generation = Some(claim.metadata.generation.unwrap_or(0) + 1);
        claim.metadata.resource_version = Some(revision);
        Ok(())
    }

    /// Delete a claim as a user would. With finalizers present only the
    /// deletion timestamp is set.
    ///
    /// # Errors
    ///
    /// Fails if the claim does not exist.
    pub async fn request_deletion(&self, key: &ClaimKey, now: DateTime<Utc>) -> Result<()> {
        let timestamp = time_of(now)?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let unguarded = state
            .claims
            .get(key)
            .ok_or_else(|| Error::not_found(CLAIM_KIND, key.to_string()))?
            .finalizers()
            .is_empty();
        if unguarded {
            state.purge_claim(key);
            return Ok(());
        }

        let revision = state.next_revision();
        if let Some(claim) = state.claims.get_mut(key) {
            if claim.metadata.deletion_timestamp.is_none() {
                claim.metadata.deletion_timestamp = Some(timestamp);
                claim.metadata.resource_version = Some(revision);
            }
        }
        Ok(())
    }

    /// Snapshot of a stored claim.
    pub async fn claim(&self, key: &ClaimKey) -> Option<IdentityClaim> {
        self.state.read().await.claims.get(key).cloned()
    }

    /// Snapshot of a stored certificate.
    pub async fn certificate(&self, namespace: &str, name: &str) -> Option<Certificate> {
        self.state
            .read()
            .await
            .certificates
            .get(&ClaimKey::new(namespace, name))
            .cloned()
    }

    /// Number of stored certificates.
    pub async fn certificate_count(&self) -> usize {
        self.state.read().await.certificates.len()
    }

    /// Add a pod with the given labels.
    pub async fn add_pod(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let labels = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.state.write().await.pods.push(Pod {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels,
        });
    }

    /// Remove a pod by name.
    pub async fn remove_pod(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .pods
            .retain(|p| !(p.namespace == namespace && p.name == name));
    }

    /// Report a certificate as issued, as cert-manager would.
    ///
    /// # Errors
    ///
    /// Fails if the certificate does not exist.
    pub async fn mark_certificate_ready(
        &self,
        namespace: &str,
        name: &str,
        not_after: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let revision = state.next_revision();
        let cert = state
            .certificates
            .get_mut(&ClaimKey::new(namespace, name))
            .ok_or_else(|| Error::not_found(CERTIFICATE_KIND, format!("{namespace}/{name}")))?;

        cert.status = Some(CertificateStatus {
            conditions: vec![CertificateCondition {
                condition_type: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("Ready".to_string()),
                message: Some("Certificate is up to date and has not expired".to_string()),
            }],
            not_after: Some(not_after),
        });
        cert.metadata.resource_version = Some(revision);
        Ok(())
    }

    /// Remove a certificate out of band, bypassing the client.
    pub async fn remove_certificate(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .certificates
            .remove(&ClaimKey::new(namespace, name));
    }

    /// Make every certificate write fail with `reason`; `None` clears it.
    pub async fn fail_certificate_writes(&self, reason: Option<&str>) {
        self.state.write().await.faults.certificate_writes = reason.map(str::to_string);
    }

    /// Make every workload query fail with `reason`; `None` clears it.
    pub async fn fail_workload_queries(&self, reason: Option<&str>) {
        self.state.write().await.faults.workload_queries = reason.map(str::to_string);
    }

    /// Make the next `count` status writes fail with a conflict.
    pub async fn inject_status_conflicts(&self, count: usize) {
        self.state.write().await.faults.status_conflicts = count;
    }

    /// Writes performed so far.
    pub async fn writes(&self) -> WriteCounts {
        self.state.read().await.writes
    }
}

#[async_trait]
impl ClaimStore for InMemoryCluster {
    async fn get(&self, key: &ClaimKey) -> Result<Option<IdentityClaim>> {
        Ok(self.claim(key).await)
    }

    async fn update(&self, claim: &IdentityClaim) -> Result<IdentityClaim> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let revision = state.next_revision();
        let stored = state.writable_claim(claim)?;

        stored.metadata.finalizers = claim.metadata.finalizers.clone();
        stored.metadata.labels = claim.metadata.labels.clone();
        stored.metadata.annotations = claim.metadata.annotations.clone();
        stored.metadata.resource_version = Some(revision);

        let updated = stored.clone();
        state.writes.claim_updates += 1;

        if updated.is_deleting() && updated.finalizers().is_empty() {
            state.purge_claim(&key_of(&updated)?);
        }
        Ok(updated)
    }

    async fn update_status(&self, claim: &IdentityClaim) -> Result<IdentityClaim> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if state.faults.status_conflicts > 0 {
            state.faults.status_conflicts -= 1;
            return Err(Error::conflict(CLAIM_KIND, key_of(claim)?.to_string()));
        }

        let revision = state.next_revision();
        let stored = state.writable_claim(claim)?;
        stored.status = claim.status.clone();
        stored.metadata.resource_version = Some(revision);

        let updated = stored.clone();
        state.writes.status_updates += 1;
        Ok(updated)
    }
}

#[async_trait]
impl WorkloadQuery for InMemoryCluster {
    async fn count(&self, namespace: &str, selector: &Selector) -> Result<usize> {
        let state = self.state.read().await;
        if let Some(reason) = &state.faults.workload_queries {
            return Err(Error::query(namespace, reason.clone()));
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| p.namespace == namespace && selector.matches(&p.labels))
            .count())
    }
}

#[async_trait]
impl CertificateClient for InMemoryCluster {
    async fn create_or_update(&self, desired: &Certificate) -> Result<UpsertOutcome> {
        let name = desired.name_any();
        let namespace = desired
            .namespace()
            .ok_or_else(|| Error::certificate(&name, "namespace is required"))?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if let Some(reason) = &state.faults.certificate_writes {
            return Err(Error::certificate(&name, reason.clone()));
        }

        let key = ClaimKey::new(namespace, &name);
        let revision = state.next_revision();
        let outcome = match state.certificates.get_mut(&key) {
            Some(existing) if existing.satisfies(desired) => {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(existing) => {
                existing.converge_to(desired);
                existing.metadata.resource_version = Some(revision);
                UpsertOutcome::Updated
            }
            None => {
                let mut cert = desired.clone();
                cert.metadata.uid = Some(state.next_uid("cert"));
                cert.metadata.resource_version = Some(revision);
                cert.status = None;
                state.certificates.insert(key, cert);
                UpsertOutcome::Created
            }
        };

        state.writes.certificate_writes += 1;
        Ok(outcome)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Certificate>> {
        Ok(self.certificate(namespace, name).await)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .certificates
            .remove(&ClaimKey::new(namespace, name))
            .ok_or_else(|| Error::not_found(CERTIFICATE_KIND, format!("{namespace}/{name}")))?;
        state.writes.certificate_deletes += 1;
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an instant.
    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

fn key_of(claim: &IdentityClaim) -> Result<ClaimKey> {
    ClaimKey::of(claim).ok_or_else(|| {
        Error::store(
            "write",
            format!("{CLAIM_KIND} '{}' has no namespace", claim.name_any()),
        )
    })
}

/// Metadata timestamp for an instant, going through its wire format.
fn time_of(now: DateTime<Utc>) -> Result<Time> {
    let raw = serde_json::Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    serde_json::from_value(raw).map_err(|e| Error::store("timestamp", e.to_string()))
}
