//! Collaborators backed by the Kubernetes API.
//!
//! Claim writes are merge patches that carry the resource version read at
//! the start of the pass, so the API server rejects stale writes with 409.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::Selector;
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::certificate::Certificate;
use crate::claim::IdentityClaim;
use crate::client::{CertificateClient, ClaimStore, WorkloadQuery};
use crate::error::{Error, Result};
use crate::types::{ClaimKey, UpsertOutcome};

const CLAIM_KIND: &str = "IdentityClaim";
const CERTIFICATE_KIND: &str = "Certificate";

/// Translate an API error, keeping not-found and conflict distinct.
fn api_error(kind: &str, name: &str, err: kube::Error, fallback: impl FnOnce(String) -> Error) -> Error {
    match &err {
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found(kind, name),
        kube::Error::Api(ae) if ae.code == 409 => Error::conflict(kind, name),
        _ => fallback(err.to_string()),
    }
}

/// [`ClaimStore`] over `IdentityClaim` objects.
#[derive(Clone)]
pub struct KubeClaimStore {
    client: Client,
    params: PatchParams,
}

impl KubeClaimStore {
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            params: PatchParams {
                field_manager: Some(field_manager.to_string()),
                ..PatchParams::default()
            },
        }
    }

    fn api(&self, claim: &IdentityClaim) -> Result<Api<IdentityClaim>> {
        let namespace = claim.namespace().ok_or_else(|| {
            Error::store("write", format!("{CLAIM_KIND} '{}' has no namespace", claim.name_any()))
        })?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

#[async_trait]
impl ClaimStore for KubeClaimStore {
    async fn get(&self, key: &ClaimKey) -> Result<Option<IdentityClaim>> {
        let api: Api<IdentityClaim> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name)
            .await
            .map_err(|e| api_error(CLAIM_KIND, &key.to_string(), e, |r| Error::store("get", r)))
    }

    async fn update(&self, claim: &IdentityClaim) -> Result<IdentityClaim> {
        let name = claim.name_any();
        let patch = json!({
            "metadata": {
                "resourceVersion": claim.resource_version(),
                "finalizers": claim.finalizers(),
            }
        });
        self.api(claim)?
            .patch(&name, &self.params, &Patch::Merge(&patch))
            .await
            .map_err(|e| api_error(CLAIM_KIND, &name, e, |r| Error::store("update", r)))
    }

    async fn update_status(&self, claim: &IdentityClaim) -> Result<IdentityClaim> {
        let name = claim.name_any();
        let patch = json!({
            "metadata": { "resourceVersion": claim.resource_version() },
            "status": claim.status,
        });
        self.api(claim)?
            .patch_status(&name, &self.params, &Patch::Merge(&patch))
            .await
            .map_err(|e| api_error(CLAIM_KIND, &name, e, |r| Error::store("update_status", r)))
    }
}

/// [`WorkloadQuery`] over pods.
#[derive(Clone)]
pub struct KubeWorkloadQuery {
    client: Client,
}

impl KubeWorkloadQuery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadQuery for KubeWorkloadQuery {
    async fn count(&self, namespace: &str, selector: &Selector) -> Result<usize> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels_from(selector);
        let pods = api
            .list_metadata(&params)
            .await
            .map_err(|e| Error::query(namespace, e.to_string()))?;
        debug!(namespace, selector = %selector, matched = pods.items.len(), "listed pods");
        Ok(pods.items.len())
    }
}

/// [`CertificateClient`] over cert-manager `Certificate` objects.
#[derive(Clone)]
pub struct KubeCertificateClient {
    client: Client,
    params: PostParams,
}

impl KubeCertificateClient {
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            params: PostParams {
                field_manager: Some(field_manager.to_string()),
                ..PostParams::default()
            },
        }
    }

    fn api(&self, namespace: &str) -> Api<Certificate> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl CertificateClient for KubeCertificateClient {
    async fn create_or_update(&self, desired: &Certificate) -> Result<UpsertOutcome> {
        let name = desired.name_any();
        let namespace = desired
            .namespace()
            .ok_or_else(|| Error::certificate(&name, "namespace is required"))?;
        let api = self.api(&namespace);
        let failed = |e: kube::Error| {
            api_error(CERTIFICATE_KIND, &name, e, |r| Error::certificate(&name, r))
        };

        let Some(mut existing) = api.get_opt(&name).await.map_err(failed)? else {
            api.create(&self.params, desired).await.map_err(failed)?;
            return Ok(UpsertOutcome::Created);
        };

        if existing.satisfies(desired) {
            return Ok(UpsertOutcome::Unchanged);
        }

        existing.converge_to(desired);
        api.replace(&name, &self.params, &existing)
            .await
            .map_err(failed)?;
        Ok(UpsertOutcome::Updated)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Certificate>> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| api_error(CERTIFICATE_KIND, name, e, |r| Error::certificate(name, r)))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| api_error(CERTIFICATE_KIND, name, e, |r| Error::certificate(name, r)))?;
        Ok(())
    }
}
