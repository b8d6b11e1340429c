//! Finalizer guard handling.
//!
//! The guard is attached before any other work so that a claim cannot be
//! purged before its certificate is cleaned up. On deletion the certificate
//! is removed first and the guard released last.

use kube::ResourceExt;
use tracing::{debug, info};

use crate::claim::IdentityClaim;
use crate::client::{CertificateClient, ClaimStore};
use crate::error::Result;
use crate::types::Requeue;

/// Attach `finalizer` to the claim and persist it.
///
/// # Errors
///
/// Propagates store errors, including conflicts.
pub async fn attach(
    claims: &dyn ClaimStore,
    claim: &IdentityClaim,
    finalizer: &str,
) -> Result<IdentityClaim> {
    let mut updated = claim.clone();
    updated.finalizers_mut().push(finalizer.to_string());

    let stored = claims.update(&updated).await?;
    debug!(claim = %claim.name_any(), finalizer, "attached finalizer");
    Ok(stored)
}

/// Clean up a claim that is being deleted.
///
/// Deletes the recorded certificate (a missing one counts as deleted), then
/// removes `finalizer` if the claim still carries it. The certificate is
/// deleted even without the guard; owner-reference garbage collection is
/// not relied on. Nothing is left to do afterwards.
///
/// # Errors
///
/// Propagates certificate deletion failures other than not-found, and store
/// errors from releasing the guard.
pub async fn finalize(
    claims: &dyn ClaimStore,
    certificates: &dyn CertificateClient,
    claim: &IdentityClaim,
    finalizer: &str,
) -> Result<Requeue> {
    let name = claim.name_any();
    let namespace = claim.namespace().unwrap_or_default();

    if let Some(certificate) = claim.certificate_ref() {
        if certificates.get(&namespace, certificate).await?.is_some() {
            match certificates.delete(&namespace, certificate).await {
                Ok(()) => info!(claim = %name, certificate, "deleted certificate"),
                Err(e) if e.is_not_found() => {
                    debug!(claim = %name, certificate, "certificate already gone");
                }
                Err(e) => return Err(e),
            }
        }
    }

    if !claim.has_finalizer(finalizer) {
        debug!(claim = %name, "finalizer already released");
        return Ok(Requeue::Never);
    }

    let mut released = claim.clone();
    released.finalizers_mut().retain(|f| f != finalizer);
    claims.update(&released).await?;

    info!(claim = %name, namespace = %namespace, "released finalizer");
    Ok(Requeue::Never)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::{TimeZone, Utc};
    use kube::Resource;

    use super::*;
    use crate::certificate::{Certificate, CertificateSpec};
    use crate::claim::{IdentityClaimSpec, IdentityClaimStatus};
    use crate::memory::InMemoryCluster;
    use crate::selector::label_selector;
    use crate::types::ClaimKey;

    const FINALIZER: &str = "identity.cluster.local/finalizer";
    const FOREIGN: &str = "backup.example.com/protect";

    /// A deleting claim guarded by `finalizers`, with a recorded and
    /// existing certificate.
    async fn deleting_claim(cluster: &InMemoryCluster, finalizers: &[&str]) -> IdentityClaim {
        let key = ClaimKey::new("payments", "api");
        let mut claim = IdentityClaim::new(
            "api",
            IdentityClaimSpec {
                selector: label_selector("app", "api"),
                ..IdentityClaimSpec::default()
            },
        );
        claim.metadata.namespace = Some("payments".to_string());
        let mut claim = cluster.create_claim(claim).await.unwrap();

        claim.metadata.finalizers = Some(finalizers.iter().map(|f| (*f).to_string()).collect());
        let mut claim = ClaimStore::update(cluster, &claim).await.unwrap();
        claim.status = Some(IdentityClaimStatus {
            certificate_ref: Some("api-identity".to_string()),
            ..IdentityClaimStatus::default()
        });
        let claim = cluster.update_status(&claim).await.unwrap();

        let mut cert = Certificate::new("api-identity", CertificateSpec::default());
        cert.metadata.namespace = Some("payments".to_string());
        cert.metadata.owner_references = claim.controller_owner_ref(&()).map(|r| vec![r]);
        cluster.create_or_update(&cert).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        cluster.request_deletion(&key, now).await.unwrap();
        cluster.claim(&key).await.unwrap()
    }

    #[tokio::test]
    async fn test_finalize_deletes_certificate_then_releases() {
        let cluster = InMemoryCluster::new();
        let claim = deleting_claim(&cluster, &[FINALIZER]).await;

        let requeue = finalize(&cluster, &cluster, &claim, FINALIZER).await.unwrap();

        assert_eq!(requeue, Requeue::Never);
        assert_eq!(cluster.writes().await.certificate_deletes, 1);
        assert!(cluster.claim(&ClaimKey::new("payments", "api")).await.is_none());
    }

    #[tokio::test]
    async fn test_finalize_without_guard_still_deletes_certificate() {
        let cluster = InMemoryCluster::new();
        let claim = deleting_claim(&cluster, &[FOREIGN]).await;
        let updates_before = cluster.writes().await.claim_updates;

        let requeue = finalize(&cluster, &cluster, &claim, FINALIZER).await.unwrap();

        assert_eq!(requeue, Requeue::Never);
        assert!(cluster.certificate("payments", "api-identity").await.is_none());
        assert_eq!(cluster.writes().await.certificate_deletes, 1);
        assert_eq!(cluster.writes().await.claim_updates, updates_before);

        let remaining = cluster.claim(&ClaimKey::new("payments", "api")).await.unwrap();
        assert!(remaining.has_finalizer(FOREIGN));
    }

    #[tokio::test]
    async fn test_finalize_keeps_foreign_finalizers() {
        let cluster = InMemoryCluster::new();
        let claim = deleting_claim(&cluster, &[FOREIGN, FINALIZER]).await;

        finalize(&cluster, &cluster, &claim, FINALIZER).await.unwrap();

        let remaining = cluster.claim(&ClaimKey::new("payments", "api")).await.unwrap();
        assert_eq!(remaining.finalizers(), [FOREIGN.to_string()]);
    }
}
