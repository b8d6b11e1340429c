//! Controller runtime wiring.
//!
//! Watches `IdentityClaim`s and the certificates they own, and drives the
//! [`Reconciler`] once per change or requeue. The runtime guarantees at most
//! one in-flight pass per claim.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use idclaim_core::OperatorConfig;
use kube::api::{Api, ListParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::certificate::Certificate;
use crate::claim::IdentityClaim;
use crate::error::{Error, Result};
use crate::kube_client::{KubeCertificateClient, KubeClaimStore, KubeWorkloadQuery};
use crate::reconciler::{Reconciler, ReconcilerConfig};
use crate::types::{ClaimKey, Requeue};

/// Shared state handed to every reconcile call.
pub struct Context {
    pub reconciler: Reconciler,
    pub error_backoff: Duration,
}

/// Map a requeue hint onto a controller action.
#[must_use]
pub fn to_action(requeue: Requeue) -> Action {
    match requeue {
        Requeue::Immediately => Action::requeue(Duration::ZERO),
        Requeue::After(delay) => Action::requeue(delay),
        Requeue::Never => Action::await_change(),
    }
}

#[instrument(skip(claim, ctx), fields(claim = %claim.name_any(), namespace = %claim.namespace().unwrap_or_default()))]
async fn reconcile(claim: Arc<IdentityClaim>, ctx: Arc<Context>) -> Result<Action> {
    let key = ClaimKey::of(&claim)
        .ok_or_else(|| Error::invalid_config("IdentityClaim is missing a namespace"))?;
    let requeue = ctx.reconciler.reconcile(&key).await?;
    debug!(?requeue, "pass complete");
    Ok(to_action(requeue))
}

fn error_policy(claim: Arc<IdentityClaim>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        claim = %claim.name_any(),
        error = %error,
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.error_backoff)
    } else {
        Action::await_change()
    }
}

/// Run the controller until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the reconciler cannot be built or the
/// `IdentityClaim` CRD is not served by the cluster.
pub async fn run(client: Client, config: &OperatorConfig) -> Result<()> {
    let field_manager = &config.controller.field_manager;
    let reconciler = Reconciler::builder()
        .with_claim_store(Arc::new(KubeClaimStore::new(client.clone(), field_manager)))
        .with_workload_query(Arc::new(KubeWorkloadQuery::new(client.clone())))
        .with_certificate_client(Arc::new(KubeCertificateClient::new(
            client.clone(),
            field_manager,
        )))
        .with_config(ReconcilerConfig::from(config))
        .build()?;

    let claims: Api<IdentityClaim> = Api::all(client.clone());
    let certificates: Api<Certificate> = Api::all(client);

    if let Err(e) = claims.list(&ListParams::default().limit(1)).await {
        error!(error = %e, "IdentityClaim CRD is not queryable; install it with `idclaim crd`");
        return Err(Error::store("list", e.to_string()));
    }

    let context = Arc::new(Context {
        reconciler,
        error_backoff: config.timing.error_backoff,
    });

    info!(
        trust_domain = %config.identity.trust_domain,
        field_manager = %field_manager,
        "starting IdentityClaim controller"
    );

    Controller::new(claims, watcher::Config::default())
        .owns(certificates, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(claim = %object, ?action, "reconciled"),
                Err(e) => debug!(error = %e, "reconcile dispatch failed"),
            }
        })
        .await;

    info!("controller stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_maps_to_action() {
        assert_eq!(
            to_action(Requeue::Immediately),
            Action::requeue(Duration::ZERO)
        );
        assert_eq!(
            to_action(Requeue::After(Duration::from_secs(30))),
            Action::requeue(Duration::from_secs(30))
        );
        assert_eq!(to_action(Requeue::Never), Action::await_change());
    }
}
