//! K8s-style reconciliation loop for `IdentityClaim` resources.
//!
//! A claim selects pods by label and asks for a SPIFFE identity. The
//! reconciler assigns the identity URI, keeps a cert-manager `Certificate`
//! for it in the desired state, and mirrors issuance progress back onto the
//! claim's status.
//!
//! # Key Concepts
//!
//! ## Reconciliation
//!
//! Every pass is level-triggered and handles one concern at a time:
//! 1. Attach the finalizer guard
//! 2. Assign `identityUri` and `certificateRef` (phase `Pending`)
//! 3. Verify that the selector matches pods
//! 4. Create or update the managed certificate
//! 5. Track readiness (`Issuing` → `Ready`) and schedule renewal checks
//!
//! On deletion the certificate is removed before the guard is released.
//!
//! ## Collaborators
//!
//! The reconciler talks to the outside world only through [`ClaimStore`],
//! [`WorkloadQuery`], [`CertificateClient`] and [`Clock`]. The
//! [`kube_client`] module implements them against the API server. With the
//! `test-util` feature, `memory::InMemoryCluster` implements them in memory.
//!
//! # Example
//!
//! ```ignore
//! use idclaim_reconciler::{ClaimKey, InMemoryCluster, Reconciler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cluster = InMemoryCluster::new_arc();
//!     let reconciler = Reconciler::builder()
//!         .with_cluster(cluster.clone())
//!         .build()
//!         .unwrap();
//!
//!     let requeue = reconciler
//!         .reconcile(&ClaimKey::new("payments", "api"))
//!         .await
//!         .unwrap();
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod certificate;
pub mod claim;
pub mod client;
pub mod conditions;
pub mod controller;
pub mod error;
pub mod finalizer;
pub mod kube_client;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod reconciler;
pub mod selector;
pub mod types;

// Re-export main types
pub use certificate::{Certificate, CertificateSpec, CertificateStatus, go_duration, parse_ttl};
pub use claim::{
    IdentityClaim, IdentityClaimSpec, IdentityClaimStatus, IssuerRef, Phase, crd_with_ttl_policy,
};
pub use client::{CertificateClient, ClaimStore, Clock, SystemClock, WorkloadQuery};
pub use conditions::{Condition, ConditionLedger, ConditionStatus, ConditionUpdate};
pub use error::{Error, Result};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
pub use kube::core::{Selector, SelectorExt};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{InMemoryCluster, ManualClock, WriteCounts};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use selector::{SelectorError, compile as compile_selector, label_selector};
pub use types::{ClaimKey, Requeue, UpsertOutcome};
