//! Label selector validation and workload counting.
//!
//! Claims carry the Kubernetes [`LabelSelector`]. It is compiled into a
//! [`kube::core::Selector`] before any query is made; a malformed selector is
//! reported as [`SelectorError`] and never treated as "no matches".
//!
//! Operator parsing, matching and query rendering are kube's. This module
//! adds the label syntax and value-arity checks the API server would apply.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use kube::core::{Expression, Selector};
use thiserror::Error;

use crate::client::WorkloadQuery;
use crate::error::Result;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Reasons a label selector cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("label key must not be empty")]
    EmptyKey,

    #[error("invalid label key '{key}'")]
    InvalidKey { key: String },

    #[error("invalid label value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("operator {operator} on key '{key}' requires at least one value")]
    MissingValues { key: String, operator: String },

    #[error("operator {operator} on key '{key}' must not have values")]
    UnexpectedValues { key: String, operator: String },

    #[error("\"{operator}\" on key '{key}' is not a valid requirement: {reason}")]
    Expression {
        key: String,
        operator: String,
        reason: String,
    },
}

/// Selector matching a single `key=value` label.
pub fn label_selector(key: impl Into<String>, value: impl Into<String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(key.into(), value.into())])),
        match_expressions: None,
    }
}

/// Compile a label selector.
///
/// An empty selector compiles to one that matches every workload.
///
/// # Errors
///
/// Returns [`SelectorError`] on an invalid key or value, a value list that
/// does not fit the operator, or an operator kube does not recognise.
pub fn compile(selector: &LabelSelector) -> std::result::Result<Selector, SelectorError> {
    let labels = selector.match_labels.clone().unwrap_or_default();
    for (key, value) in &labels {
        validate_key(key)?;
        validate_value(key, value)?;
    }

    let expressions = selector
        .match_expressions
        .iter()
        .flatten()
        .map(compile_requirement)
        .collect::<std::result::Result<Vec<_>, SelectorError>>()?;

    let mut compiled: Selector = labels.into_iter().collect();
    compiled.extend(expressions);
    Ok(compiled)
}

fn compile_requirement(
    req: &LabelSelectorRequirement,
) -> std::result::Result<Expression, SelectorError> {
    validate_key(&req.key)?;
    let values = req.values.as_deref().unwrap_or_default();
    values
        .iter()
        .try_for_each(|value| validate_value(&req.key, value))?;

    match req.operator.as_str() {
        "In" | "NotIn" if values.is_empty() => Err(SelectorError::MissingValues {
            key: req.key.clone(),
            operator: req.operator.clone(),
        }),
        "Exists" | "DoesNotExist" if !values.is_empty() => Err(SelectorError::UnexpectedValues {
            key: req.key.clone(),
            operator: req.operator.clone(),
        }),
        _ => Expression::try_from(req.clone()).map_err(|e| SelectorError::Expression {
            key: req.key.clone(),
            operator: req.operator.clone(),
            reason: e.0,
        }),
    }
}

/// Label keys are `[prefix/]name`: the prefix a DNS subdomain, the name a
/// qualified name of at most 63 characters.
fn validate_key(key: &str) -> std::result::Result<(), SelectorError> {
    if key.is_empty() {
        return Err(SelectorError::EmptyKey);
    }

    let invalid = || SelectorError::InvalidKey {
        key: key.to_string(),
    };

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if prefix.is_some_and(|prefix| !is_dns_subdomain(prefix)) {
        return Err(invalid());
    }
    if name.is_empty() || !is_qualified_name(name) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> std::result::Result<(), SelectorError> {
    if value.is_empty() || is_qualified_name(value) {
        Ok(())
    } else {
        Err(SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn is_qualified_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let edges_ok = bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric);

    name.len() <= MAX_NAME_LEN
        && edges_ok
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_dns_subdomain(prefix: &str) -> bool {
    let label_char = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && prefix.split('.').all(|label| {
            let bytes = label.as_bytes();
            !label.is_empty()
                && label.len() <= MAX_NAME_LEN
                && bytes.first().is_some_and(label_char)
                && bytes.last().is_some_and(label_char)
                && bytes.iter().all(|b| label_char(b) || *b == b'-')
        })
}

/// Count the workloads in `namespace` matched by `selector`.
///
/// # Errors
///
/// Returns [`crate::Error::Selector`] if the selector does not compile and
/// [`crate::Error::Query`] if the workload query fails.
pub async fn count_matching(
    workloads: &dyn WorkloadQuery,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<usize> {
    let compiled = compile(selector)?;
    workloads.count(namespace, &compiled).await
}
