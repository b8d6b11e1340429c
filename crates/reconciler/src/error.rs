//! Error types for the reconciler crate.

use std::fmt;

use crate::selector::SelectorError;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Every variant except [`Error::InvalidConfig`] is retryable: the controller
/// requeues the claim and the next pass re-derives its action from observed
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Object does not exist.
    NotFound { kind: String, name: String },
    /// Optimistic concurrency check failed.
    Conflict { kind: String, name: String },
    /// Record store read or write failed.
    Store { operation: String, reason: String },
    /// Workload query failed (the selector itself was valid).
    Query { namespace: String, reason: String },
    /// Label selector could not be compiled.
    Selector(SelectorError),
    /// Certificate collaborator rejected a write or read.
    Certificate { name: String, reason: String },
    /// Claim TTL could not be parsed.
    InvalidTtl { value: String, reason: String },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, name } => {
                write!(f, "{kind} '{name}' not found")
            }
            Self::Conflict { kind, name } => {
                write!(f, "{kind} '{name}' was modified concurrently")
            }
            Self::Store { operation, reason } => {
                write!(f, "store operation '{operation}' failed: {reason}")
            }
            Self::Query { namespace, reason } => {
                write!(f, "failed to list pods in namespace '{namespace}': {reason}")
            }
            Self::Selector(err) => {
                write!(f, "invalid selector: {err}")
            }
            Self::Certificate { name, reason } => {
                write!(f, "certificate '{name}': {reason}")
            }
            Self::InvalidTtl { value, reason } => {
                write!(f, "invalid ttl '{value}': {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Selector(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SelectorError> for Error {
    fn from(err: SelectorError) -> Self {
        Self::Selector(err)
    }
}

impl Error {
    /// Create a not found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a store error.
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a workload query error.
    pub fn query(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Query {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Create a certificate error.
    pub fn certificate(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Certificate {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid TTL error.
    pub fn invalid_ttl(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTtl {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the controller should retry after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }

    /// Whether this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is an optimistic concurrency conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
