//! Core types for the reconciler.

use std::fmt;
use std::time::Duration;

use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::claim::IdentityClaim;

/// Namespace-qualified identity of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimKey {
    pub namespace: String,
    pub name: String,
}

impl ClaimKey {
    /// Create a new claim key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing claim object, if it carries a namespace.
    #[must_use]
    pub fn of(claim: &IdentityClaim) -> Option<Self> {
        claim
            .namespace()
            .map(|namespace| Self::new(namespace, claim.name_any()))
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// When the delivery system should invoke the reconciler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Run another pass right away.
    Immediately,
    /// Run another pass no later than this delay.
    After(Duration),
    /// Nothing left to do until the object changes.
    Never,
}

/// Result of a certificate create-or-update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The stored object already matched the desired state.
    Unchanged,
    /// The object did not exist and was created.
    Created,
    /// The object existed and its spec or ownership was overwritten.
    Updated,
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Updated => "updated",
        };
        f.write_str(text)
    }
}
