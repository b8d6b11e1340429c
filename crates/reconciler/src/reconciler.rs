//! Reconciler implementation.
//!
//! Each pass reads the claim, decides the single next concern to address and
//! persists the outcome before returning a requeue hint. Nothing is carried
//! between passes; every decision is re-derived from observed state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use idclaim_core::{IssuerDefaults, OperatorConfig};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::certificate::{self, Certificate};
use crate::claim::{self, IdentityClaim, IdentityClaimStatus, Phase};
use crate::client::{CertificateClient, ClaimStore, Clock, SystemClock, WorkloadQuery};
use crate::conditions::{
    CERTIFICATE_ISSUED, ConditionStatus, ConditionUpdate, PODS_VERIFIED, READY,
};
use crate::error::{Error, Result};
use crate::finalizer;
use crate::selector;
use crate::types::{ClaimKey, Requeue};

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Trust domain of issued identity URIs.
    pub trust_domain: String,
    /// Finalizer guarding certificate cleanup.
    pub finalizer: String,
    /// Suffix appended to the claim name to form the certificate name.
    pub certificate_suffix: String,
    /// Certificate validity when the claim sets no TTL.
    pub default_ttl: Duration,
    /// Issuer used when the claim names none.
    pub default_issuer: IssuerDefaults,
    /// Re-check delay when no pods match.
    pub no_pods_requeue: Duration,
    /// Re-check delay while the certificate is being issued.
    pub issuing_requeue: Duration,
    /// How long before expiry the claim is re-checked.
    pub renew_before_expiry: Duration,
    /// Re-check delay once the renewal instant has passed.
    pub heartbeat: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from(&OperatorConfig::default())
    }
}

impl From<&OperatorConfig> for ReconcilerConfig {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            trust_domain: config.identity.trust_domain.clone(),
            finalizer: config.identity.finalizer.clone(),
            certificate_suffix: config.identity.certificate_suffix.clone(),
            default_ttl: config.identity.default_ttl,
            default_issuer: config.identity.default_issuer.clone(),
            no_pods_requeue: config.timing.no_pods_requeue,
            issuing_requeue: config.timing.issuing_requeue,
            renew_before_expiry: config.timing.renew_before_expiry,
            heartbeat: config.timing.heartbeat,
        }
    }
}

/// Reconciles `IdentityClaim`s into issued certificates.
pub struct Reconciler {
    claims: Arc<dyn ClaimStore>,
    workloads: Arc<dyn WorkloadQuery>,
    certificates: Arc<dyn CertificateClient>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        claims: Arc<dyn ClaimStore>,
        workloads: Arc<dyn WorkloadQuery>,
        certificates: Arc<dyn CertificateClient>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            claims,
            workloads,
            certificates,
            clock,
            config,
        }
    }

    /// Start building a reconciler.
    #[must_use]
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Run one reconciliation pass for a claim.
    ///
    /// # Errors
    ///
    /// Every error is retryable. Selector and certificate failures are
    /// recorded on the claim (phase `Failed`) before being returned; store
    /// and query failures leave the status untouched.
    pub async fn reconcile(&self, key: &ClaimKey) -> Result<Requeue> {
        let Some(claim) = self.claims.get(key).await? else {
            debug!(claim = %key, "claim no longer exists");
            return Ok(Requeue::Never);
        };

        if claim.is_deleting() {
            debug!(claim = %key, "claim is being deleted");
            return finalizer::finalize(
                self.claims.as_ref(),
                self.certificates.as_ref(),
                &claim,
                &self.config.finalizer,
            )
            .await;
        }

        if !claim.has_finalizer(&self.config.finalizer) {
            finalizer::attach(self.claims.as_ref(), &claim, &self.config.finalizer).await?;
            return Ok(Requeue::Immediately);
        }

        if claim.phase().is_none() {
            self.initialize_status(key, &claim).await?;
            return Ok(Requeue::Immediately);
        }

        self.reconcile_identity(key, &claim).await
    }

    /// Assign the identity URI and certificate name and enter `Pending`.
    async fn initialize_status(&self, key: &ClaimKey, claim: &IdentityClaim) -> Result<()> {
        let mut status = claim.status.clone().unwrap_or_default();
        status.phase = Some(Phase::Pending);
        let identity_uri = status
            .identity_uri
            .get_or_insert_with(|| {
                claim::identity_uri(&self.config.trust_domain, &key.namespace, &key.name)
            })
            .clone();
        status
            .certificate_ref
            .get_or_insert_with(|| claim::certificate_name(&key.name, &self.config.certificate_suffix));

        self.write_status(claim, status).await?;
        info!(claim = %key, identity = %identity_uri, "assigned identity");
        Ok(())
    }

    async fn reconcile_identity(&self, key: &ClaimKey, claim: &IdentityClaim) -> Result<Requeue> {
        let now = self.clock.now();
        let generation = claim.metadata.generation;
        let mut status = claim.status.clone().unwrap_or_default();

        let identity_uri = status
            .identity_uri
            .get_or_insert_with(|| {
                claim::identity_uri(&self.config.trust_domain, &key.namespace, &key.name)
            })
            .clone();
        let certificate_name = status
            .certificate_ref
            .get_or_insert_with(|| claim::certificate_name(&key.name, &self.config.certificate_suffix))
            .clone();

        // Workload selection.
        let matched =
            selector::count_matching(self.workloads.as_ref(), &key.namespace, &claim.spec.selector)
                .await;
        match matched {
            Err(Error::Selector(err)) => {
                let message = err.to_string();
                warn!(claim = %key, error = %message, "invalid selector");
                status.phase = Some(Phase::Failed);
                set(&mut status, PODS_VERIFIED, false, "SelectorError", &message, generation, now);
                // Ready mirrors the blocking reason.
                set(&mut status, READY, false, "SelectorError", &message, generation, now);
                self.write_status(claim, status).await?;
                return Err(Error::Selector(err));
            }
            Err(err) => return Err(err),
            Ok(0) => {
                debug!(claim = %key, "no pods match selector");
                set(
                    &mut status,
                    PODS_VERIFIED,
                    false,
                    "NoPods",
                    "No pods matching selector found",
                    generation,
                    now,
                );
                self.write_status(claim, status).await?;
                return Ok(Requeue::After(self.config.no_pods_requeue));
            }
            Ok(count) => {
                let message = format!("Found {count} matching pod(s)");
                set(&mut status, PODS_VERIFIED, true, "PodsFound", &message, generation, now);
            }
        }

        // Certificate desired state.
        let upserted = match certificate::desired_certificate(
            claim,
            &identity_uri,
            &certificate_name,
            &self.config,
        ) {
            Ok(desired) => self.certificates.create_or_update(&desired).await,
            Err(err) => Err(err),
        };
        match upserted {
            Ok(outcome) => {
                debug!(claim = %key, certificate = %certificate_name, %outcome, "reconciled certificate");
            }
            Err(err) => {
                let message = err.to_string();
                warn!(claim = %key, certificate = %certificate_name, error = %message, "certificate reconciliation failed");
                status.phase = Some(Phase::Failed);
                set(&mut status, CERTIFICATE_ISSUED, false, "CertificateFailed", &message, generation, now);
                set(&mut status, READY, false, "CertificateFailed", &message, generation, now);
                if let Err(write_err) = self.write_status(claim, status).await {
                    warn!(claim = %key, error = %write_err, "failed to record certificate failure");
                }
                return Err(err);
            }
        }

        // Certificate observed state.
        match self.certificates.get(&key.namespace, &certificate_name).await? {
            Some(cert) if cert.is_ready() => self.mark_ready(key, claim, status, &cert, now).await,
            Some(_) => {
                self.mark_issuing(key, claim, status, "Certificate is being issued", now)
                    .await
            }
            None => {
                self.mark_issuing(key, claim, status, "Waiting for certificate to be created", now)
                    .await
            }
        }
    }

    async fn mark_issuing(
        &self,
        key: &ClaimKey,
        claim: &IdentityClaim,
        mut status: IdentityClaimStatus,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Requeue> {
        let generation = claim.metadata.generation;
        if status.phase != Some(Phase::Issuing) {
            info!(claim = %key, from = ?status.phase, "certificate issuing");
        }
        status.phase = Some(Phase::Issuing);
        set(&mut status, CERTIFICATE_ISSUED, false, "Issuing", message, generation, now);
        set(&mut status, READY, false, "Issuing", message, generation, now);

        self.write_status(claim, status).await?;
        Ok(Requeue::After(self.config.issuing_requeue))
    }

    async fn mark_ready(
        &self,
        key: &ClaimKey,
        claim: &IdentityClaim,
        mut status: IdentityClaimStatus,
        cert: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<Requeue> {
        let generation = claim.metadata.generation;
        if status.phase != Some(Phase::Ready) {
            info!(claim = %key, expires_at = ?cert.not_after(), "identity ready");
        }
        status.phase = Some(Phase::Ready);
        if let Some(not_after) = cert.not_after() {
            status.expires_at = Some(not_after);
        }
        set(
            &mut status,
            CERTIFICATE_ISSUED,
            true,
            "Issued",
            "Certificate has been issued",
            generation,
            now,
        );
        set(&mut status, READY, true, "Ready", "Identity is ready for use", generation, now);

        let requeue = self.renewal_requeue(status.expires_at, now);
        self.write_status(claim, status).await?;
        Ok(requeue)
    }

    /// Re-check at `expiresAt - renew_before_expiry`, or after the heartbeat
    /// once that instant has passed.
    fn renewal_requeue(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Requeue {
        let lead = TimeDelta::from_std(self.config.renew_before_expiry).unwrap_or(TimeDelta::zero());
        let until_renewal = expires_at
            .map(|expires_at| expires_at - lead)
            .filter(|renew_at| *renew_at > now)
            .and_then(|renew_at| (renew_at - now).to_std().ok());

        match until_renewal {
            Some(delay) => Requeue::After(delay),
            None => Requeue::After(self.config.heartbeat),
        }
    }

    /// Replace the status subresource unless nothing changed.
    async fn write_status(&self, claim: &IdentityClaim, status: IdentityClaimStatus) -> Result<()> {
        if claim.status.as_ref() == Some(&status) {
            debug!(claim = %claim.name_any(), "status unchanged");
            return Ok(());
        }
        let mut updated = claim.clone();
        updated.status = Some(status);
        self.claims.update_status(&updated).await?;
        Ok(())
    }
}

fn set(
    status: &mut IdentityClaimStatus,
    condition_type: &str,
    value: bool,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
    now: DateTime<Utc>,
) {
    status.conditions.upsert(
        &ConditionUpdate {
            condition_type,
            status: ConditionStatus::from_bool(value),
            reason,
            message,
            observed_generation,
        },
        now,
    );
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    claims: Option<Arc<dyn ClaimStore>>,
    workloads: Option<Arc<dyn WorkloadQuery>>,
    certificates: Option<Arc<dyn CertificateClient>>,
    clock: Option<Arc<dyn Clock>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            claims: None,
            workloads: None,
            certificates: None,
            clock: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the claim store.
    pub fn with_claim_store(mut self, claims: Arc<dyn ClaimStore>) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Set the workload query.
    pub fn with_workload_query(mut self, workloads: Arc<dyn WorkloadQuery>) -> Self {
        self.workloads = Some(workloads);
        self
    }

    /// Set the certificate client.
    pub fn with_certificate_client(mut self, certificates: Arc<dyn CertificateClient>) -> Self {
        self.certificates = Some(certificates);
        self
    }

    /// Use one object for all three collaborators.
    pub fn with_cluster<C>(self, cluster: Arc<C>) -> Self
    where
        C: ClaimStore + WorkloadQuery + CertificateClient + 'static,
    {
        self.with_claim_store(cluster.clone())
            .with_workload_query(cluster.clone())
            .with_certificate_client(cluster)
    }

    /// Set the clock. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the trust domain.
    pub fn trust_domain(mut self, trust_domain: impl Into<String>) -> Self {
        self.config.trust_domain = trust_domain.into();
        self
    }

    /// Build the reconciler.
    pub fn build(self) -> Result<Reconciler> {
        let claims = self
            .claims
            .ok_or_else(|| Error::invalid_config("Claim store is required"))?;
        let workloads = self
            .workloads
            .ok_or_else(|| Error::invalid_config("Workload query is required"))?;
        let certificates = self
            .certificates
            .ok_or_else(|| Error::invalid_config("Certificate client is required"))?;

        if self.config.trust_domain.trim().is_empty() {
            return Err(Error::invalid_config("Trust domain must not be empty"));
        }
        if self.config.finalizer.trim().is_empty() {
            return Err(Error::invalid_config("Finalizer must not be empty"));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(Reconciler::new(
            claims,
            workloads,
            certificates,
            clock,
            self.config,
        ))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::TimeZone;

    use super::*;
    use crate::claim::IdentityClaimSpec;
    use crate::memory::{InMemoryCluster, ManualClock};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

    use crate::selector::label_selector;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        cluster: Arc<InMemoryCluster>,
        clock: Arc<ManualClock>,
        reconciler: Reconciler,
        key: ClaimKey,
    }

    async fn harness(selector: LabelSelector) -> Harness {
        let cluster = InMemoryCluster::new_arc();
        let clock = Arc::new(ManualClock::new(t0()));
        let reconciler = Reconciler::builder()
            .with_cluster(cluster.clone())
            .with_clock(clock.clone())
            .build()
            .unwrap();

        let mut claim = IdentityClaim::new(
            "api",
            IdentityClaimSpec {
                selector,
                ..IdentityClaimSpec::default()
            },
        );
        claim.metadata.namespace = Some("payments".to_string());
        cluster.create_claim(claim).await.unwrap();

        Harness {
            cluster,
            clock,
            reconciler,
            key: ClaimKey::new("payments", "api"),
        }
    }

    #[tokio::test]
    async fn test_missing_claim_is_done() {
        let h = harness(LabelSelector::default()).await;
        let requeue = h
            .reconciler
            .reconcile(&ClaimKey::new("payments", "gone"))
            .await
            .unwrap();
        assert_eq!(requeue, Requeue::Never);
    }

    #[tokio::test]
    async fn test_first_pass_only_attaches_finalizer() {
        let h = harness(label_selector("app", "api")).await;

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::Immediately);

        let claim = h.cluster.claim(&h.key).await.unwrap();
        assert!(claim.has_finalizer("identity.cluster.local/finalizer"));
        assert!(claim.status.is_none());
    }

    #[tokio::test]
    async fn test_second_pass_initializes_status() {
        let h = harness(label_selector("app", "api")).await;
        h.reconciler.reconcile(&h.key).await.unwrap();

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::Immediately);

        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Pending));
        assert_eq!(
            status.identity_uri.as_deref(),
            Some("spiffe://cluster.local/ns/payments/ic/api")
        );
        assert_eq!(status.certificate_ref.as_deref(), Some("api-identity"));
        assert_eq!(h.cluster.certificate_count().await, 0);
    }

    #[tokio::test]
    async fn test_issuing_until_certificate_ready() {
        let h = harness(label_selector("app", "api")).await;
        h.cluster.add_pod("payments", "api-0", &[("app", "api")]).await;
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(5)));

        let claim = h.cluster.claim(&h.key).await.unwrap();
        let status = claim.status.unwrap();
        assert_eq!(status.phase, Some(Phase::Issuing));
        let issued = status.conditions.get(CERTIFICATE_ISSUED).unwrap();
        assert_eq!(issued.reason, "Issuing");
        assert_eq!(issued.message, "Certificate is being issued");
        assert_eq!(
            status.conditions.get(PODS_VERIFIED).unwrap().message,
            "Found 1 matching pod(s)"
        );
        assert!(h.cluster.certificate("payments", "api-identity").await.is_some());
    }

    #[tokio::test]
    async fn test_ready_schedules_renewal() {
        let h = harness(label_selector("app", "api")).await;
        h.cluster.add_pod("payments", "api-0", &[("app", "api")]).await;
        for _ in 0..3 {
            h.reconciler.reconcile(&h.key).await.unwrap();
        }

        let expires = t0() + TimeDelta::hours(1);
        h.cluster
            .mark_certificate_ready("payments", "api-identity", expires)
            .await
            .unwrap();

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(50 * 60)));

        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Ready));
        assert_eq!(status.expires_at, Some(expires));
        assert!(status.conditions.is_true(READY));
        assert!(status.conditions.is_true(CERTIFICATE_ISSUED));
    }

    #[tokio::test]
    async fn test_past_renewal_uses_heartbeat() {
        let h = harness(label_selector("app", "api")).await;
        h.cluster.add_pod("payments", "api-0", &[("app", "api")]).await;
        for _ in 0..3 {
            h.reconciler.reconcile(&h.key).await.unwrap();
        }
        h.cluster
            .mark_certificate_ready("payments", "api-identity", t0() + TimeDelta::minutes(5))
            .await
            .unwrap();

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(30 * 60)));

        h.clock.advance(Duration::from_secs(3600));
        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(30 * 60)));
    }

    #[tokio::test]
    async fn test_no_pods_keeps_phase() {
        let h = harness(label_selector("app", "api")).await;
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();

        let requeue = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(requeue, Requeue::After(Duration::from_secs(30)));

        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Pending));
        let pods = status.conditions.get(PODS_VERIFIED).unwrap();
        assert_eq!(pods.status, ConditionStatus::False);
        assert_eq!(pods.reason, "NoPods");
        assert!(status.conditions.get(READY).is_none());
    }

    #[tokio::test]
    async fn test_selector_error_marks_failed() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "Like".to_string(),
                values: Some(vec!["api".to_string()]),
            }]),
        };
        let h = harness(selector).await;
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();

        let err = h.reconciler.reconcile(&h.key).await.unwrap_err();
        assert!(matches!(err, Error::Selector(_)));
        assert!(err.is_retryable());

        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Failed));
        assert_eq!(status.conditions.get(PODS_VERIFIED).unwrap().reason, "SelectorError");
        assert_eq!(status.conditions.get(READY).unwrap().reason, "SelectorError");
    }

    #[tokio::test]
    async fn test_query_failure_leaves_status() {
        let h = harness(label_selector("app", "api")).await;
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();
        let before = h.cluster.claim(&h.key).await.unwrap().status;

        h.cluster.fail_workload_queries(Some("forbidden")).await;
        let err = h.reconciler.reconcile(&h.key).await.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(h.cluster.claim(&h.key).await.unwrap().status, before);
    }

    #[tokio::test]
    async fn test_certificate_failure_marks_failed() {
        let h = harness(label_selector("app", "api")).await;
        h.cluster.add_pod("payments", "api-0", &[("app", "api")]).await;
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();

        h.cluster.fail_certificate_writes(Some("admission webhook denied")).await;
        let err = h.reconciler.reconcile(&h.key).await.unwrap_err();
        assert!(matches!(err, Error::Certificate { .. }));

        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Failed));
        let issued = status.conditions.get(CERTIFICATE_ISSUED).unwrap();
        assert_eq!(issued.reason, "CertificateFailed");
        assert!(issued.message.contains("admission webhook denied"));
    }

    #[tokio::test]
    async fn test_invalid_ttl_is_certificate_failure() {
        let h = harness(label_selector("app", "api")).await;
        h.cluster.add_pod("payments", "api-0", &[("app", "api")]).await;
        h.cluster
            .edit_claim_spec(
                &h.key,
                IdentityClaimSpec {
                    selector: label_selector("app", "api"),
                    ttl: Some("soon".to_string()),
                    issuer_ref: None,
                },
            )
            .await
            .unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();

        let err = h.reconciler.reconcile(&h.key).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTtl { .. }));
        let status = h.cluster.claim(&h.key).await.unwrap().status.unwrap();
        assert_eq!(status.phase, Some(Phase::Failed));
        assert_eq!(h.cluster.certificate_count().await, 0);
    }

    #[tokio::test]
    async fn test_builder_requires_collaborators() {
        assert!(Reconciler::builder().build().is_err());

        let cluster = InMemoryCluster::new_arc();
        let result = Reconciler::builder()
            .with_cluster(cluster)
            .trust_domain("")
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_config_from_operator_config() {
        let mut operator = OperatorConfig::default();
        operator.identity.trust_domain = "prod.example".to_string();
        operator.timing.heartbeat = Duration::from_secs(60);

        let config = ReconcilerConfig::from(&operator);
        assert_eq!(config.trust_domain, "prod.example");
        assert_eq!(config.heartbeat, Duration::from_secs(60));
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
    }
}
