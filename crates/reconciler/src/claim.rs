//! The `IdentityClaim` custom resource.
//!
//! A claim selects a set of pods by label and requests a SPIFFE identity for
//! them. The operator owns the whole status subresource; the spec is written
//! by users only.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSON, JSONSchemaProps, ValidationRule,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{CustomResource, CustomResourceExt, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::certificate::go_duration;
use crate::conditions::{Condition, ConditionLedger};

/// API group of the claim resource.
pub const GROUP: &str = "identity.cluster.local";

/// URI scheme of issued identities.
pub const IDENTITY_SCHEME: &str = "spiffe";

/// Desired state of an `IdentityClaim`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "identity.cluster.local",
    version = "v1alpha1",
    kind = "IdentityClaim",
    namespaced,
    status = "IdentityClaimStatus",
    shortname = "ic",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase","description":"Current phase"}"#,
    printcolumn = r#"{"name":"Identity","type":"string","jsonPath":".status.identityUri","description":"Assigned SPIFFE identity"}"#,
    printcolumn = r#"{"name":"Certificate","type":"string","jsonPath":".status.certificateRef","description":"Managed certificate"}"#,
    printcolumn = r#"{"name":"Expires","type":"date","jsonPath":".status.expiresAt","description":"Certificate expiration"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaimSpec {
    /// Pods matching this selector share the identity.
    pub selector: LabelSelector,

    /// Certificate validity as a Go duration (`"1h"`, `"90m"`). The operator
    /// default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    /// Issuer to request the certificate from. The operator default applies
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerRef>,
}

/// Reference to a cert-manager issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    pub name: String,
    /// `Issuer` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// `cert-manager.io` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Lifecycle phase of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Phase {
    /// Identity assigned, no work performed yet.
    Pending,
    /// Certificate requested, not yet ready.
    Issuing,
    /// Certificate ready for use.
    Ready,
    /// The last pass hit a selector or issuance error.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "Pending",
            Self::Issuing => "Issuing",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// Observed state of an `IdentityClaim`.
///
/// Optional fields serialize as `null` so that a status write always
/// replaces the previous status in full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaimStatus {
    #[serde(default)]
    pub phase: Option<Phase>,

    /// `spiffe://<trust-domain>/ns/<namespace>/ic/<name>`.
    #[serde(default)]
    pub identity_uri: Option<String>,

    /// Name of the managed `Certificate` (and of its Secret).
    #[serde(default)]
    pub certificate_ref: Option<String>,

    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    #[schemars(with = "Vec<Condition>")]
    pub conditions: ConditionLedger,
}

impl IdentityClaim {
    /// Current phase, `None` before status initialization.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Whether a deletion timestamp is set.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the given finalizer is present.
    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Recorded certificate name, if status was initialized.
    #[must_use]
    pub fn certificate_ref(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.certificate_ref.as_deref())
    }
}

/// Identity URI of a claim.
#[must_use]
pub fn identity_uri(trust_domain: &str, namespace: &str, name: &str) -> String {
    format!("{IDENTITY_SCHEME}://{trust_domain}/ns/{namespace}/ic/{name}")
}

/// Name of the managed certificate of a claim.
#[must_use]
pub fn certificate_name(claim_name: &str, suffix: &str) -> String {
    format!("{claim_name}{suffix}")
}

/// CEL rule bounding `spec.ttl` to `[min, max]`.
#[must_use]
pub fn ttl_bounds_rule(min: Duration, max: Duration) -> ValidationRule {
    let (min, max) = (go_duration(min), go_duration(max));
    ValidationRule {
        rule: format!("duration(self) >= duration('{min}') && duration(self) <= duration('{max}')"),
        message: Some(format!("TTL must be between {min} and {max}")),
        ..ValidationRule::default()
    }
}

/// The `IdentityClaim` CRD with the TTL policy published on `spec.ttl`:
/// the operator default as the schema default and the bounds as a
/// validation rule.
#[must_use]
pub fn crd_with_ttl_policy(
    default: Duration,
    min: Duration,
    max: Duration,
) -> CustomResourceDefinition {
    let mut crd = IdentityClaim::crd();
    let ttl = crd.spec.versions.iter_mut().filter_map(|v| {
        let root = v.schema.as_mut()?.open_api_v3_schema.as_mut()?;
        spec_property(root, "ttl")
    });

    for ttl in ttl {
        ttl.default = Some(JSON(serde_json::Value::String(go_duration(default))));
        ttl.x_kubernetes_validations = Some(vec![ttl_bounds_rule(min, max)]);
    }
    crd
}

fn spec_property<'a>(root: &'a mut JSONSchemaProps, name: &str) -> Option<&'a mut JSONSchemaProps> {
    root.properties
        .as_mut()?
        .get_mut("spec")?
        .properties
        .as_mut()?
        .get_mut(name)
}
