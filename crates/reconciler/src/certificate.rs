//! The managed cert-manager `Certificate` and its desired spec.
//!
//! Only the fields the operator writes or reads are modelled; anything else
//! cert-manager stores on the object is ignored on decode.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::api::ObjectMeta;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::claim::{IdentityClaim, IdentityClaimSpec, IssuerRef};
use crate::error::{Error, Result};
use crate::reconciler::ReconcilerConfig;

/// Label linking a certificate back to its claim.
pub const CLAIM_LABEL: &str = "identity.cluster.local/claim";

/// Label naming the managing controller.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

const MANAGED_BY: &str = "idclaim";
const DEFAULT_ISSUER_KIND: &str = "Issuer";
const CERT_MANAGER_GROUP: &str = "cert-manager.io";
const EC_KEY_SIZE: u32 = 256;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Desired state of a cert-manager `Certificate`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "Certificate",
    namespaced,
    status = "CertificateStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,

    pub issuer_ref: CertificateIssuerRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PrivateKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateIssuerRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "ECDSA")]
    Ecdsa,
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKey {
    pub algorithm: KeyAlgorithm,
    pub size: u32,
}

/// State reported by cert-manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    #[serde(default)]
    pub conditions: Vec<CertificateCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub not_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Certificate {
    /// Whether cert-manager reports `Ready=True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            status
                .conditions
                .iter()
                .any(|c| c.condition_type == "Ready" && c.status == "True")
        })
    }

    /// Expiry of the currently issued certificate.
    #[must_use]
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.status.as_ref().and_then(|s| s.not_after)
    }

    /// Whether this stored certificate already carries everything `desired`
    /// sets: the same spec and owner references, and every desired label.
    /// Labels added by other writers do not count as drift.
    #[must_use]
    pub fn satisfies(&self, desired: &Certificate) -> bool {
        let labels = self.labels();
        self.spec == desired.spec
            && self.owner_references() == desired.owner_references()
            && desired
                .labels()
                .iter()
                .all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Overwrite the spec, owner references and desired labels with those of
    /// `desired`, keeping status and any foreign labels.
    pub fn converge_to(&mut self, desired: &Certificate) {
        self.spec = desired.spec.clone();
        self.metadata.owner_references = desired.metadata.owner_references.clone();
        self.labels_mut()
            .extend(desired.labels().iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// UID of the controlling owner, if any.
    #[must_use]
    pub fn controller_uid(&self) -> Option<&str> {
        self.owner_references()
            .iter()
            .find(|r| r.controller == Some(true))
            .map(|r| r.uid.as_str())
    }
}

/// Parse a claim TTL, falling back to `default` when unset.
///
/// # Errors
///
/// Returns [`Error::InvalidTtl`] if the value is not a duration or is zero.
pub fn parse_ttl(ttl: Option<&str>, default: Duration) -> Result<Duration> {
    let Some(raw) = ttl.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };

    let duration =
        humantime::parse_duration(raw).map_err(|e| Error::invalid_ttl(raw, e.to_string()))?;

    if duration.is_zero() {
        return Err(Error::invalid_ttl(raw, "must be greater than zero"));
    }
    Ok(duration)
}

/// Render a duration the way Go's `time.Duration.String` does
/// (`1h0m0s`, `20m0s`, `1.5s`, `250ms`).
#[must_use]
pub fn go_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();

    if secs == 0 {
        let nanos = u64::from(nanos);
        return match nanos {
            0 => "0s".to_string(),
            n if n < 1_000 => format!("{n}ns"),
            n if n < 1_000_000 => format!("{}µs", decimal(n, 1_000, 3)),
            n => format!("{}ms", decimal(n, 1_000_000, 6)),
        };
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let seconds = decimal(seconds * NANOS_PER_SEC + u64::from(nanos), NANOS_PER_SEC, 9);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, minutes) => format!("{minutes}m{seconds}s"),
        (hours, minutes) => format!("{hours}h{minutes}m{seconds}s"),
    }
}

/// `value / unit` with the fractional part written without trailing zeros.
fn decimal(value: u64, unit: u64, width: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        whole.to_string()
    } else {
        let digits = format!("{frac:0width$}");
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Desired certificate spec for a claim.
///
/// `renewBefore` is one third of the duration; the key is always ECDSA P-256.
///
/// # Errors
///
/// Returns [`Error::InvalidTtl`] if the claim's TTL does not parse.
pub fn desired_spec(
    spec: &IdentityClaimSpec,
    claim_name: &str,
    identity_uri: &str,
    certificate_name: &str,
    config: &ReconcilerConfig,
) -> Result<CertificateSpec> {
    let duration = parse_ttl(spec.ttl.as_deref(), config.default_ttl)?;
    let renew_before = duration / 3;

    Ok(CertificateSpec {
        secret_name: certificate_name.to_string(),
        duration: Some(go_duration(duration)),
        renew_before: Some(go_duration(renew_before)),
        common_name: Some(claim_name.to_string()),
        uris: vec![identity_uri.to_string()],
        issuer_ref: issuer_ref(spec.issuer_ref.as_ref(), config),
        private_key: Some(PrivateKey {
            algorithm: KeyAlgorithm::Ecdsa,
            size: EC_KEY_SIZE,
        }),
    })
}

fn issuer_ref(requested: Option<&IssuerRef>, config: &ReconcilerConfig) -> CertificateIssuerRef {
    match requested {
        Some(issuer) => CertificateIssuerRef {
            name: issuer.name.clone(),
            kind: Some(
                issuer
                    .kind
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ISSUER_KIND.to_string()),
            ),
            group: Some(
                issuer
                    .group
                    .clone()
                    .unwrap_or_else(|| CERT_MANAGER_GROUP.to_string()),
            ),
        },
        None => CertificateIssuerRef {
            name: config.default_issuer.name.clone(),
            kind: Some(config.default_issuer.kind.clone()),
            group: Some(config.default_issuer.group.clone()),
        },
    }
}

/// Desired `Certificate` object for a claim, owned by the claim.
///
/// # Errors
///
/// Returns [`Error::InvalidTtl`] if the claim's TTL does not parse, or
/// [`Error::InvalidConfig`] if the claim lacks the metadata needed for an
/// owner reference.
pub fn desired_certificate(
    claim: &IdentityClaim,
    identity_uri: &str,
    certificate_name: &str,
    config: &ReconcilerConfig,
) -> Result<Certificate> {
    let claim_name = claim.name_any();
    let owner = claim
        .controller_owner_ref(&())
        .ok_or_else(|| Error::invalid_config(format!("claim '{claim_name}' has no uid")))?;

    let spec = desired_spec(
        &claim.spec,
        &claim_name,
        identity_uri,
        certificate_name,
        config,
    )?;

    let labels = BTreeMap::from([
        (CLAIM_LABEL.to_string(), claim_name),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ]);

    Ok(Certificate {
        metadata: ObjectMeta {
            name: Some(certificate_name.to_string()),
            namespace: claim.namespace(),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec,
        status: None,
    })
}
